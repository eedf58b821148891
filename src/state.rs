//! UI-agnostic application state types
//!
//! Shared between screens and independent of any UI framework.

/// Outcome of an in-flight fetch, as shown to the user: at most one of the
/// idle hint, the loading indicator, the error message, or the data is
/// visible at a time.
///
/// Every trigger bumps an internal generation counter and hands the caller
/// a token. A completion is only committed when its token still matches the
/// counter, so when a request is re-triggered mid-flight the older outcome
/// is discarded instead of racing the newer one for display.
#[derive(Debug)]
pub struct FetchState<T> {
    data: Option<T>,
    error: Option<String>,
    loading: bool,
    generation: u64,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            loading: false,
            generation: 0,
        }
    }
}

impl<T> FetchState<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new fetch: clears any previous outcome, marks the state
    /// loading, and returns the token the completion must present.
    pub fn begin(&mut self) -> u64 {
        self.data = None;
        self.error = None;
        self.loading = true;
        self.generation += 1;
        self.generation
    }

    /// Commit a completion. Returns false (and changes nothing) when the
    /// token is stale, i.e. a newer fetch was started after this one.
    pub fn settle(&mut self, token: u64, result: Result<T, String>) -> bool {
        if token != self.generation {
            return false;
        }
        self.loading = false;
        match result {
            Ok(value) => {
                self.data = Some(value);
                self.error = None;
            }
            Err(message) => {
                self.data = None;
                self.error = Some(message);
            }
        }
        true
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_idle(&self) -> bool {
        !self.loading && self.data.is_none() && self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_idle() {
        let state: FetchState<String> = FetchState::new();
        assert!(state.is_idle());
        assert!(!state.is_loading());
        assert!(state.data().is_none());
        assert!(state.error().is_none());
    }

    #[test]
    fn test_begin_shows_only_loading() {
        let mut state: FetchState<String> = FetchState::new();
        state.begin();
        assert!(state.is_loading());
        assert!(state.data().is_none());
        assert!(state.error().is_none());
    }

    #[test]
    fn test_settle_ok_shows_only_data() {
        let mut state = FetchState::new();
        let token = state.begin();
        assert!(state.settle(token, Ok("result".to_string())));
        assert!(!state.is_loading());
        assert_eq!(state.data(), Some(&"result".to_string()));
        assert!(state.error().is_none());
    }

    #[test]
    fn test_settle_err_shows_only_error() {
        let mut state: FetchState<String> = FetchState::new();
        let token = state.begin();
        assert!(state.settle(token, Err("request failed".to_string())));
        assert!(!state.is_loading());
        assert!(state.data().is_none());
        assert_eq!(state.error(), Some("request failed"));
    }

    #[test]
    fn test_stale_completion_is_dropped() {
        let mut state: FetchState<String> = FetchState::new();
        let first = state.begin();
        let second = state.begin();
        // The older call resolves after the newer one was issued.
        assert!(!state.settle(first, Ok("stale".to_string())));
        assert!(state.is_loading());
        assert!(state.data().is_none());
        // The newest call still commits normally.
        assert!(state.settle(second, Ok("fresh".to_string())));
        assert_eq!(state.data(), Some(&"fresh".to_string()));
    }

    #[test]
    fn test_retrigger_after_error_clears_it() {
        let mut state: FetchState<String> = FetchState::new();
        let token = state.begin();
        state.settle(token, Err("request failed".to_string()));
        state.begin();
        assert!(state.error().is_none());
        assert!(state.is_loading());
    }
}
