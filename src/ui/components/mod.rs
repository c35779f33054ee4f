pub mod activity_list;
pub mod progress_bar;
pub mod question_view;
pub mod summary;
pub mod tab_bar;
