//! Named trace sections around each inference.

/// Receives begin/end events for the timed section of each inference. Sections never nest.
pub trait TraceSink {
    fn begin_section(&mut self, name: &str);
    fn end_section(&mut self);
}

#[derive(Debug, Default)]
pub struct NoopTraceSink;

impl TraceSink for NoopTraceSink {
    fn begin_section(&mut self, _name: &str) {}
    fn end_section(&mut self) {}
}

/// Emits sections as `trace` level log records.
#[derive(Debug, Default)]
pub struct LogTraceSink {
    current: Option<String>,
}

impl TraceSink for LogTraceSink {
    fn begin_section(&mut self, name: &str) {
        log::trace!("begin section {}", name);
        self.current = Some(name.to_string());
    }

    fn end_section(&mut self) {
        if let Some(name) = self.current.take() {
            log::trace!("end section {}", name);
        }
    }
}
