use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use env_logger::{Env, Target};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Clear, Paragraph, Wrap};

use quizdeck::app::{App, AppScreen, NoticeLevel, QuizStage};
use quizdeck::config::Config;
use quizdeck::content::ContentSource;
use quizdeck::content::local::LocalLibrary;
use quizdeck::error::AppError;
use quizdeck::event::{AppEvent, EventHandler};
use quizdeck::quiz::definition::QuizDefinition;
use quizdeck::quiz::question::{QuestionKind, Response};
use quizdeck::store::json_store::JsonStore;
use quizdeck::tabs::Tab;
use quizdeck::ui::components::activity_list::{ActivityList, DetailPanel};
use quizdeck::ui::components::progress_bar::ProgressBar;
use quizdeck::ui::components::question_view::QuestionView;
use quizdeck::ui::components::summary::Summary;
use quizdeck::ui::components::tab_bar::TabBar;
use quizdeck::ui::layout::{AppLayout, centered_rect, pack_hint_lines};

#[derive(Parser)]
#[command(
    name = "quizdeck",
    version,
    about = "Terminal quizzes, workouts and listening drills with resumable sessions"
)]
struct Cli {
    #[arg(short, long, help = "Start signed in as this user")]
    user: Option<String>,

    #[arg(short, long, help = "Theme name")]
    theme: Option<String>,

    #[arg(short, long, help = "Base URL of a quizdeck content server")]
    remote: Option<String>,

    #[arg(long, value_name = "FILE", help = "Validate a quiz JSON file, add it to the library and exit")]
    import: Option<PathBuf>,
}

/// The terminal belongs to the UI, so log lines go to a file in the data dir.
fn init_logging(data_dir: &Path) {
    let path = data_dir.join("quizdeck.log");
    let file = fs::create_dir_all(data_dir)
        .and_then(|()| OpenOptions::new().create(true).append(true).open(&path));
    match file {
        Ok(file) => {
            env_logger::Builder::from_env(Env::default().default_filter_or("info"))
                .target(Target::Pipe(Box::new(file)))
                .init();
        }
        Err(e) => eprintln!("logging disabled: cannot open {}: {e}", path.display()),
    }
}

#[cfg(feature = "network")]
fn remote_source(url: &str) -> Result<Option<Arc<dyn ContentSource>>> {
    let remote = quizdeck::content::remote::RemoteLibrary::new(url)?;
    log::info!("using content server {url}");
    Ok(Some(Arc::new(remote)))
}

#[cfg(not(feature = "network"))]
fn remote_source(_url: &str) -> Result<Option<Arc<dyn ContentSource>>> {
    log::warn!("built without the network feature; ignoring remote_url");
    Ok(None)
}

fn content_source(config: &Config, data_dir: &Path) -> Result<Arc<dyn ContentSource>> {
    if !config.remote_url.is_empty() {
        if let Some(remote) = remote_source(&config.remote_url)? {
            return Ok(remote);
        }
    }
    let library = LocalLibrary::new(data_dir.join("library"))?;
    Ok(Arc::new(library))
}

fn import_quiz(source: &dyn ContentSource, path: &Path) -> Result<()> {
    let json = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let result = QuizDefinition::from_json(&json).and_then(|quiz| source.create_quiz(&quiz));
    match result {
        Ok(id) => {
            println!("Imported {} as \"{id}\"", path.display());
            Ok(())
        }
        Err(AppError::Validation(violations)) => {
            eprintln!("{} is not a valid quiz:", path.display());
            for violation in &violations {
                eprintln!("  - {violation}");
            }
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let data_dir = JsonStore::default_dir();
    init_logging(&data_dir);

    let mut config = Config::load().unwrap_or_else(|e| {
        log::warn!("using default config: {e}");
        Config::default()
    });
    if let Some(theme) = cli.theme {
        config.theme = theme;
    }
    if let Some(remote) = cli.remote {
        config.remote_url = remote;
    }
    config.validate(&quizdeck::ui::theme::Theme::available_themes());

    let source = content_source(&config, &data_dir)?;

    if let Some(path) = cli.import {
        return import_quiz(source.as_ref(), &path);
    }

    let store = JsonStore::with_base_dir(data_dir)?;
    let events = EventHandler::new(Duration::from_millis(250));
    let mut app = App::new(config, store, source, cli.user, Some(events.sender()));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app, &events);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = result {
        log::error!("exiting after error: {err:?}");
        eprintln!("Error: {err:?}");
    }

    Ok(())
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    events: &EventHandler,
) -> Result<()> {
    loop {
        terminal.draw(|frame| render(frame, app))?;

        match events.next()? {
            AppEvent::Key(key) => handle_key(app, key),
            AppEvent::Content(ticket, response) => app.apply_response(ticket, response),
            AppEvent::Tick | AppEvent::Resize(_, _) => {}
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if key.kind != KeyEventKind::Press {
        return;
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.should_quit = true;
        return;
    }

    match app.screen {
        AppScreen::Home => handle_home_key(app, key),
        AppScreen::Loading => {
            if key.code == KeyCode::Esc {
                app.go_home();
            }
        }
        AppScreen::ResumePrompt => handle_resume_key(app, key),
        AppScreen::Quiz => handle_quiz_key(app, key),
        AppScreen::QuizSummary => handle_summary_key(app, key),
        AppScreen::Workout => handle_workout_key(app, key),
        AppScreen::Article => handle_article_key(app, key),
    }
}

fn handle_home_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
        KeyCode::Tab | KeyCode::Right => app.next_tab(),
        KeyCode::BackTab | KeyCode::Left => app.prev_tab(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
        KeyCode::Enter => app.open_selected(),
        KeyCode::Char('l') => app.toggle_skip_listening(),
        KeyCode::Char('u') => app.toggle_sign_in(),
        KeyCode::Char('x') | KeyCode::Delete => app.delete_selected_quiz(),
        KeyCode::Char('r') => app.refresh_list(),
        _ => {}
    }
}

fn handle_resume_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('r') | KeyCode::Enter => app.resume(),
        KeyCode::Char('f') => app.start_fresh(),
        KeyCode::Esc => app.go_home(),
        _ => {}
    }
}

fn handle_quiz_key(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Esc {
        app.leave_activity();
        return;
    }
    if matches!(app.quiz_stage, QuizStage::Feedback(_)) {
        if matches!(key.code, KeyCode::Enter | KeyCode::Char(' ')) {
            app.next_question();
        }
        return;
    }

    match app.current_kind() {
        Some(QuestionKind::MultipleChoice) => match key.code {
            KeyCode::Char(c @ '1'..='9') => app.choose(c as usize - '1' as usize),
            KeyCode::Down | KeyCode::Char('j') => app.move_choice(true),
            KeyCode::Up | KeyCode::Char('k') => app.move_choice(false),
            KeyCode::Enter => app.submit_current(),
            _ => {}
        },
        Some(QuestionKind::TrueFalse) => match key.code {
            KeyCode::Char('t') => app.submit(Response::TrueFalse(true)),
            KeyCode::Char('f') => app.submit(Response::TrueFalse(false)),
            _ => {}
        },
        Some(QuestionKind::FillInTheBlank) | Some(QuestionKind::Listening) => match key.code {
            KeyCode::Enter => app.submit_current(),
            KeyCode::Backspace => {
                app.text_input.pop();
            }
            KeyCode::Char(c) => app.text_input.push(c),
            _ => {}
        },
        Some(QuestionKind::Matching) => match key.code {
            KeyCode::Down | KeyCode::Char('j') => app.matching.move_cursor(true),
            KeyCode::Up | KeyCode::Char('k') => app.matching.move_cursor(false),
            KeyCode::Right | KeyCode::Char('l') | KeyCode::Char(' ') => app.matching.cycle(true),
            KeyCode::Left | KeyCode::Char('h') => app.matching.cycle(false),
            KeyCode::Enter => app.submit_current(),
            _ => {}
        },
        None => {}
    }
}

fn handle_summary_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('m') => app.retry_mistakes(),
        KeyCode::Enter | KeyCode::Char('q') => app.acknowledge_summary(),
        KeyCode::Esc => app.leave_activity(),
        _ => {}
    }
}

fn handle_workout_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter | KeyCode::Char(' ') => app.complete_exercise(),
        KeyCode::Esc | KeyCode::Char('q') => app.leave_activity(),
        _ => {}
    }
}

fn handle_article_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Backspace => app.screen = AppScreen::Home,
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
        _ => {}
    }
}

// --- rendering ---

fn render(frame: &mut ratatui::Frame, app: &App) {
    let area = frame.area();
    let colors = &app.theme.colors;

    let bg = Block::default().style(Style::default().bg(colors.bg()));
    frame.render_widget(bg, area);

    match app.screen {
        AppScreen::Home => render_home(frame, app),
        AppScreen::Loading => render_loading(frame, app),
        AppScreen::ResumePrompt => render_resume_prompt(frame, app),
        AppScreen::Quiz => render_quiz(frame, app),
        AppScreen::QuizSummary => render_summary(frame, app),
        AppScreen::Workout => render_workout(frame, app),
        AppScreen::Article => render_article(frame, app),
    }
}

/// Footer lines: the notice (if any) above the packed key hints.
fn footer_lines(app: &App, hints: &[&str], width: u16) -> Vec<Line<'static>> {
    let colors = &app.theme.colors;
    let mut lines = Vec::new();
    if let Some(notice) = &app.notice {
        let color = match notice.level {
            NoticeLevel::Info => colors.success(),
            NoticeLevel::Error => colors.error(),
        };
        lines.push(Line::from(Span::styled(
            format!(" {}", notice.text),
            Style::default().fg(color),
        )));
    }
    for hint in pack_hint_lines(hints, width as usize) {
        lines.push(Line::from(Span::styled(
            hint,
            Style::default().fg(colors.muted()),
        )));
    }
    lines
}

fn render_home(frame: &mut ratatui::Frame, app: &App) {
    let area = frame.area();
    let tab = app.current_tab();

    let mut hints = vec!["[Tab] Next tab", "[j/k] Move", "[Enter] Open"];
    let skip_hint = if app.preferences.skip_listening {
        "[l] Include listening"
    } else {
        "[l] Skip listening"
    };
    hints.push(skip_hint);
    hints.push(if app.auth.is_signed_in() { "[u] Sign out" } else { "[u] Sign in" });
    if app.flags.content_editing && tab == Tab::Quizzes {
        hints.push("[x] Delete");
    }
    hints.push("[q] Quit");

    let footer = footer_lines(app, &hints, area.width);
    let layout = AppLayout::new(area, footer.len() as u16);

    let tabs = app.tabs();
    let status = match &app.auth.current_user {
        Some(user) => format!("{} ", user.display_name),
        None => "not signed in ".to_string(),
    };
    frame.render_widget(
        TabBar::new(&tabs, app.tab_index, status, app.theme),
        layout.header,
    );

    let items = app.home_items();
    let empty_text = match tab {
        Tab::KnowledgeBase => "No articles yet.",
        _ => "Nothing here yet.",
    };
    frame.render_widget(
        ActivityList {
            title: tab.label(),
            items: &items,
            selected: app.list_selected,
            inline_descriptions: layout.sidebar.is_none(),
            empty_text,
            theme: app.theme,
        },
        layout.main,
    );

    if let Some(sidebar) = layout.sidebar {
        let (title, body) = match (tab, items.get(app.list_selected)) {
            (Tab::KnowledgeBase, Some(_)) => app
                .selected_article()
                .map(|a| (a.title.as_str(), a.body.as_str()))
                .unwrap_or(("", "")),
            (_, Some((title, description))) => (title.as_str(), description.as_str()),
            (_, None) => ("", ""),
        };
        frame.render_widget(
            DetailPanel {
                title,
                body,
                theme: app.theme,
            },
            sidebar,
        );
    }

    frame.render_widget(Paragraph::new(footer), layout.footer);
}

fn popup(frame: &mut ratatui::Frame, app: &App, title: &str, lines: Vec<Line<'_>>) {
    let colors = &app.theme.colors;
    let area = centered_rect(50, 30, frame.area());
    frame.render_widget(Clear, area);
    let block = Block::bordered()
        .title(format!(" {title} "))
        .border_style(Style::default().fg(colors.accent()))
        .style(Style::default().bg(colors.bg()));
    frame.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(block),
        area,
    );
}

fn render_loading(frame: &mut ratatui::Frame, app: &App) {
    let colors = &app.theme.colors;
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("Loading {}\u{2026}", app.loading_what),
            Style::default().fg(colors.fg()),
        )),
        Line::from(""),
        Line::from(Span::styled("[Esc] Cancel", Style::default().fg(colors.muted()))),
    ];
    popup(frame, app, "quizdeck", lines);
}

fn render_resume_prompt(frame: &mut ratatui::Frame, app: &App) {
    let colors = &app.theme.colors;
    let title = app.resume_title().unwrap_or_default();
    let progress = app.resume_progress().unwrap_or_default();
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            title,
            Style::default()
                .fg(colors.accent())
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            "You have an unfinished session.",
            Style::default().fg(colors.fg()),
        )),
        Line::from(Span::styled(progress, Style::default().fg(colors.muted()))),
        Line::from(""),
        Line::from(Span::styled(
            "[r] Resume   [f] Start over   [Esc] Back",
            Style::default().fg(colors.accent()),
        )),
    ];
    popup(frame, app, "Resume?", lines);
}

fn render_quiz(frame: &mut ratatui::Frame, app: &App) {
    let area = frame.area();
    let Some(session) = &app.quiz else {
        return;
    };
    let Some(question) = session.current_question() else {
        return;
    };

    let hints: Vec<&str> = match (&app.quiz_stage, question.kind()) {
        (QuizStage::Feedback(_), _) => vec!["[Enter] Next", "[Esc] Leave (progress is kept)"],
        (_, QuestionKind::MultipleChoice) => {
            vec!["[1-9] Answer", "[j/k] Move", "[Enter] Submit", "[Esc] Leave"]
        }
        (_, QuestionKind::TrueFalse) => vec!["[t] True", "[f] False", "[Esc] Leave"],
        (_, QuestionKind::Matching) => vec![
            "[j/k] Item",
            "[h/l] Change match",
            "[Enter] Submit",
            "[Esc] Leave",
        ],
        _ => vec!["Type your answer", "[Enter] Submit", "[Esc] Leave"],
    };
    let footer = footer_lines(app, &hints, area.width);

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(footer.len() as u16),
        ])
        .split(area);

    frame.render_widget(ProgressBar::for_quiz(session, app.theme), layout[0]);
    frame.render_widget(
        QuestionView {
            question,
            number: session.current_index + 1,
            total: session.total(),
            mistakes_only: session.mistakes_only,
            stage: &app.quiz_stage,
            text_input: &app.text_input,
            choice_selected: app.choice_selected,
            matching: &app.matching,
            theme: app.theme,
        },
        layout[1],
    );
    frame.render_widget(Paragraph::new(footer), layout[2]);
}

fn render_summary(frame: &mut ratatui::Frame, app: &App) {
    let area = frame.area();
    if let Some(summary) = &app.last_summary {
        let centered = centered_rect(60, 50, area);
        frame.render_widget(Clear, centered);
        frame.render_widget(Summary::new(summary, app.theme), centered);
    }
    if let Some(notice) = &app.notice {
        let colors = &app.theme.colors;
        let line = Rect::new(area.x, area.bottom().saturating_sub(1), area.width, 1);
        frame.render_widget(
            Paragraph::new(Span::styled(
                format!(" {}", notice.text),
                Style::default().fg(colors.warning()),
            )),
            line,
        );
    }
}

fn render_workout(frame: &mut ratatui::Frame, app: &App) {
    let area = frame.area();
    let colors = &app.theme.colors;
    let Some((workout, session)) = &app.workout else {
        return;
    };

    let footer = footer_lines(
        app,
        &["[Enter] Done, next exercise", "[Esc] Leave (progress is kept)"],
        area.width,
    );
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(footer.len() as u16),
        ])
        .split(area);

    frame.render_widget(
        ProgressBar::for_count(
            &workout.title,
            session.completed_exercises,
            workout.total_exercises(),
            app.theme,
        ),
        layout[0],
    );

    let mut lines = Vec::new();
    if let Some((phase, exercise)) = session.current(workout) {
        lines.push(Line::from(Span::styled(
            format!(" {}", phase.name),
            Style::default().fg(colors.muted()),
        )));
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" {}", exercise.describe()),
            Style::default()
                .fg(colors.accent())
                .add_modifier(Modifier::BOLD),
        )));
        if let Some(notes) = &exercise.notes {
            lines.push(Line::from(Span::styled(
                format!(" {notes}"),
                Style::default().fg(colors.fg()),
            )));
        }
    }
    let block = Block::bordered()
        .title(" Workout ")
        .border_style(Style::default().fg(colors.border_focused()));
    frame.render_widget(Paragraph::new(lines).block(block), layout[1]);
    frame.render_widget(Paragraph::new(footer), layout[2]);
}

fn render_article(frame: &mut ratatui::Frame, app: &App) {
    let area = frame.area();
    let footer = footer_lines(app, &["[j/k] Previous/next article", "[Esc] Back"], area.width);
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(footer.len() as u16)])
        .split(area);

    if let Some(article) = app.selected_article() {
        frame.render_widget(
            DetailPanel {
                title: &article.title,
                body: &article.body,
                theme: app.theme,
            },
            layout[0],
        );
    }
    frame.render_widget(Paragraph::new(footer), layout[1]);
}
