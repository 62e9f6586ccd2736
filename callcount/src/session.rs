use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use tracing::warn;

use crate::config::Config;
use crate::patcher::Patcher;
use crate::registry::Registry;

/// Scope of one counting run.
///
/// Starting a session attaches a [`Patcher`] to the registry. The summary
/// line is written exactly once: by [`finish`](Session::finish), or when the
/// session is dropped without being finished.
pub struct Session {
    patcher: Arc<Patcher>,
    sink: Option<Box<dyn Write + Send>>,
}

impl Session {
    /// Reports to standard output.
    pub fn start(registry: Arc<Registry>, config: &Config) -> Self {
        Self::with_sink(registry, config, io::stdout())
    }

    pub fn with_sink(
        registry: Arc<Registry>,
        config: &Config,
        sink: impl Write + Send + 'static,
    ) -> Self {
        let patcher = Arc::new(Patcher::new(registry, config));
        patcher.attach();
        Self {
            patcher,
            sink: Some(Box::new(sink)),
        }
    }

    pub fn patcher(&self) -> &Arc<Patcher> {
        &self.patcher
    }

    pub fn registry(&self) -> &Arc<Registry> {
        self.patcher.registry()
    }

    /// Writes the summary line and returns it.
    pub fn finish(mut self) -> io::Result<String> {
        self.report()
    }

    fn report(&mut self) -> io::Result<String> {
        let line = self.patcher.finalize();
        if let Some(mut sink) = self.sink.take() {
            writeln!(sink, "{line}")?;
            sink.flush()?;
        }
        Ok(line)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.sink.is_some() {
            if let Err(err) = self.report() {
                warn!(%err, "failed to write call count summary");
            }
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("patcher", &self.patcher)
            .field("reported", &self.sink.is_none())
            .finish()
    }
}
