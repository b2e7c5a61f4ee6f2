use fail::FailScenario;

/// Configures fail points for the lifetime of the guard.
///
/// Fail points are switched off again when the guard is dropped, even when the test panics.
pub struct FailpointGuard<'a> {
    _scenario: FailScenario<'a>,
    names: Vec<String>,
}

impl<'a> FailpointGuard<'a> {
    /// Applies each `(name, action)` pair, e.g. `("merge.before_replace", "return")`.
    pub fn setup(actions: &[(&str, &str)]) -> FailpointGuard<'a> {
        let scenario = FailScenario::setup();

        let mut names = Vec::with_capacity(actions.len());
        for (name, action) in actions {
            fail::cfg(*name, action).expect("fail point action must be valid");
            names.push(name.to_string());
        }

        Self {
            _scenario: scenario,
            names,
        }
    }
}

impl Drop for FailpointGuard<'_> {
    fn drop(&mut self) {
        for name in &self.names {
            fail::remove(name);
        }
    }
}
