/// Operator commands, one per key token read by the interactive session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Accept,
    Skip,
    ToggleAerial,
    ToggleCover,
    FirstUnprocessed,
    FirstSkipped,
    ClearSelection,
    /// 0-based index into the item's trip suggestions.
    SelectTrip(usize),
    /// 0-based index into the selected trip's destinations.
    SelectDestination(usize),
    Previous,
    Next,
    MediaPrevious,
    MediaNext,
    Ingest,
    Sync,
    StartBackfill,
    DismissBackfill,
    Quit,
}

pub const DESTINATION_KEYS: [&str; 6] = ["q", "w", "e", "r", "t", "y"];

pub fn parse_key(token: &str) -> Option<Action> {
    let token = token.trim();
    let action = match token {
        "enter" | "a" => Action::Accept,
        "s" => Action::Skip,
        "x" => Action::ToggleAerial,
        "c" => Action::ToggleCover,
        "f" => Action::FirstUnprocessed,
        "g" => Action::FirstSkipped,
        "0" | "backspace" => Action::ClearSelection,
        "left" | "h" => Action::Previous,
        "right" | "l" => Action::Next,
        "up" | "k" => Action::MediaPrevious,
        "down" | "j" => Action::MediaNext,
        "i" => Action::Ingest,
        "S" => Action::Sync,
        "b" => Action::StartBackfill,
        "B" => Action::DismissBackfill,
        ":q" | "quit" => Action::Quit,
        other => {
            if let Some(pos) = DESTINATION_KEYS.iter().position(|k| *k == other) {
                return Some(Action::SelectDestination(pos));
            }
            match other.parse::<usize>() {
                Ok(n @ 1..=9) => Action::SelectTrip(n - 1),
                _ => return None,
            }
        }
    };
    Some(action)
}

pub const HELP: &str = "keys: enter/a accept  s skip  x aerial  c cover  f first-unprocessed  g first-skipped  \
0 clear  1-9 trip  q-y destination  h/l prev/next  k/j media  i ingest  S sync  b/B backfill  :q quit";
