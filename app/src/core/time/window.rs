use std::fmt::Display;

use super::DateTime;

//Open-ended query window, both bounds inclusive when present
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    start: Option<DateTime>,
    end: Option<DateTime>,
}

impl TimeWindow {
    pub fn new(start: Option<DateTime>, end: Option<DateTime>) -> Self {
        Self { start, end }
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn start(&self) -> Option<&DateTime> {
        self.start.as_ref()
    }

    pub fn end(&self) -> Option<&DateTime> {
        self.end.as_ref()
    }

    pub fn contains(&self, datetime: &DateTime) -> bool {
        self.start.is_none_or(|start| *datetime >= start) && self.end.is_none_or(|end| *datetime <= end)
    }
}

impl Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.start, &self.end) {
            (Some(start), Some(end)) => write!(f, "{}-{}", start, end),
            (Some(start), None) => write!(f, "{}-", start),
            (None, Some(end)) => write!(f, "-{}", end),
            (None, None) => write!(f, "all"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(iso: &str) -> DateTime {
        DateTime::from_iso(iso).unwrap()
    }

    #[test]
    fn unbounded_window_contains_everything() {
        assert!(TimeWindow::all().contains(&at("1999-01-01T00:00:00Z")));
    }

    #[test]
    fn bounds_are_inclusive() {
        let window = TimeWindow::new(Some(at("2024-06-01T10:00:00Z")), Some(at("2024-06-01T12:00:00Z")));

        assert!(!window.contains(&at("2024-06-01T09:59:59Z")));
        assert!(window.contains(&at("2024-06-01T10:00:00Z")));
        assert!(window.contains(&at("2024-06-01T12:00:00Z")));
        assert!(!window.contains(&at("2024-06-01T12:00:01Z")));
    }

    #[test]
    fn half_open_window() {
        let window = TimeWindow::new(Some(at("2024-06-01T10:00:00Z")), None);

        assert!(window.contains(&at("2030-01-01T00:00:00Z")));
        assert!(!window.contains(&at("2024-06-01T09:00:00Z")));
    }
}
