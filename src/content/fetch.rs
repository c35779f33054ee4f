/// Identifies one outstanding content request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
}

/// Correlates responses with the screen that asked for them. Issuing a ticket
/// or leaving a screen makes every earlier ticket stale.
#[derive(Debug, Default)]
pub struct FetchGuard {
    generation: u64,
}

impl FetchGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) -> FetchTicket {
        self.generation += 1;
        FetchTicket {
            generation: self.generation,
        }
    }

    pub fn invalidate(&mut self) {
        self.generation += 1;
    }

    pub fn is_current(&self, ticket: FetchTicket) -> bool {
        ticket.generation == self.generation
    }
}
