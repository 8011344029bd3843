/// Topic names derived from the client id `C`.
///
/// | topic | direction |
/// |---|---|
/// | `C/input` | in: available power |
/// | `C/output` | out: total output power |
/// | `C/status` | out: `ON`/`OFF`, retained |
/// | `C/alive` | out: ISO-8601 timestamp, retained |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    root: String,
}

impl Topics {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            root: client_id.into(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn input(&self) -> String {
        format!("{}/input", self.root)
    }

    pub fn output(&self) -> String {
        format!("{}/output", self.root)
    }

    pub fn status(&self) -> String {
        format!("{}/status", self.root)
    }

    pub fn alive(&self) -> String {
        format!("{}/alive", self.root)
    }

    pub fn for_output(&self, id: &str) -> OutputTopics {
        OutputTopics::new(&self.root, id)
    }
}

/// Per-output topics, rooted at `C/output/{id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTopics {
    /// `on`/`off` open/closed transitions.
    pub state: String,
    /// Inbound toggle command.
    pub set: String,
    /// `on`/`off` administrative state.
    pub enabled: String,
    /// Inbound enable commands; both spellings are accepted.
    pub enabled_set: String,
    pub status_set: String,
    /// Duty level 0..=100.
    pub dc: String,
    /// Extra topic that also receives the administrative state.
    pub extra_status: Option<String>,
    /// Extra topic that also receives the duty level.
    pub extra_dc: Option<String>,
}

impl OutputTopics {
    fn new(root: &str, id: &str) -> Self {
        let base = format!("{root}/output/{id}");
        Self {
            set: format!("{base}/set"),
            enabled: format!("{base}/enabled"),
            enabled_set: format!("{base}/enabled/set"),
            status_set: format!("{base}/status/set"),
            dc: format!("{base}/dc"),
            state: base,
            extra_status: None,
            extra_dc: None,
        }
    }

    pub fn with_extra(mut self, status: Option<String>, dc: Option<String>) -> Self {
        self.extra_status = status;
        self.extra_dc = dc;
        self
    }

    /// Inbound topics paired with the command each one carries.
    pub fn command_routes(&self) -> [(&str, &'static str); 3] {
        [
            (self.set.as_str(), "toggle"),
            (self.enabled_set.as_str(), "enabled"),
            (self.status_set.as_str(), "enabled"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_topics() {
        let t = Topics::new("wattmgr");
        assert_eq!(t.input(), "wattmgr/input");
        assert_eq!(t.output(), "wattmgr/output");
        assert_eq!(t.status(), "wattmgr/status");
        assert_eq!(t.alive(), "wattmgr/alive");
    }

    #[test]
    fn output_topics() {
        let o = Topics::new("wm").for_output("boiler");
        assert_eq!(o.state, "wm/output/boiler");
        assert_eq!(o.set, "wm/output/boiler/set");
        assert_eq!(o.enabled, "wm/output/boiler/enabled");
        assert_eq!(o.enabled_set, "wm/output/boiler/enabled/set");
        assert_eq!(o.status_set, "wm/output/boiler/status/set");
        assert_eq!(o.dc, "wm/output/boiler/dc");
        assert_eq!(o.command_routes()[0], ("wm/output/boiler/set", "toggle"));
    }
}
