/// How the reporter is invoked once the exchange has been recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    /// Awaited before the response is handed back to the transport
    Inline,
    /// Spawned on the runtime, fire-and-forget.
    /// No ordering with later requests, and reports may be lost on shutdown.
    Background,
}

impl Default for ReportMode {
    fn default() -> Self {
        ReportMode::Inline
    }
}

#[derive(Debug, Clone)]
pub struct MirrorConf {
    pub capture_body: bool,
    pub report_mode: ReportMode,
}

impl MirrorConf {
    pub fn new(capture_body: bool) -> Self {
        MirrorConf {
            capture_body,
            report_mode: ReportMode::Inline,
        }
    }

    pub fn with_report_mode(mut self, report_mode: ReportMode) -> Self {
        self.report_mode = report_mode;
        self
    }
}

impl Default for MirrorConf {
    fn default() -> Self {
        MirrorConf::new(true)
    }
}
