use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::counter::Counter;
use crate::patch::{strategy_for, PatchStrategy, SideEffect};
use crate::registry::{Registry, Subscription};
use crate::signature::Signature;

/// Counts calls to the one member named by its [`Config`].
///
/// Starts unpatched. Every [`attempt_patch`](Patcher::attempt_patch) checks
/// whether the target has become resolvable and, the first time it has,
/// installs the counting wrapper. After that it stays patched for its whole
/// lifetime and further attempts do nothing.
///
/// Dropping an attached patcher unsubscribes it from the registry.
pub struct Patcher {
    registry: Arc<Registry>,
    signature: Arc<Signature>,
    counter: Arc<Counter>,
    patched: AtomicBool,
    strategy: Box<dyn PatchStrategy>,
    subscription: OnceCell<Subscription>,
}

impl Patcher {
    pub fn new(registry: Arc<Registry>, config: &Config) -> Self {
        let signature = Signature::parse(config.target.as_str());
        let strategy = strategy_for(signature.kind());
        Self {
            registry,
            signature: Arc::new(signature),
            counter: Arc::new(Counter::new()),
            patched: AtomicBool::new(false),
            strategy,
            subscription: OnceCell::new(),
        }
    }

    /// Retries [`attempt_patch`](Patcher::attempt_patch) after every
    /// lifecycle event of the registry, and once right away.
    ///
    /// The registry only holds the patcher weakly. Attaching twice
    /// subscribes once.
    pub fn attach(self: &Arc<Self>) {
        self.subscription.get_or_init(|| {
            let patcher = Arc::downgrade(self);
            self.registry.subscribe(move |event| {
                if let Some(patcher) = patcher.upgrade() {
                    trace!(?event, signature = %patcher.signature, "re-attempting patch");
                    patcher.attempt_patch();
                }
            })
        });
        self.attempt_patch();
    }

    /// Installs the counting wrapper if the target resolves and this
    /// patcher has not done so yet. Returns whether this call installed it.
    pub fn attempt_patch(&self) -> bool {
        if self.is_patched() {
            return false;
        }
        if !self.signature.exists(&self.registry) {
            debug!(signature = %self.signature, "target not defined yet");
            return false;
        }
        // Claimed before installing: the installation fires a lifecycle
        // event of its own, which must find this patcher already patched.
        if self
            .patched
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let counter = Arc::downgrade(&self.counter);
        let side_effect: SideEffect = Arc::new(move || {
            if let Some(counter) = counter.upgrade() {
                counter.increment();
            }
        });
        match self
            .strategy
            .instrument(&self.registry, &self.signature, side_effect)
        {
            Ok(()) => {
                info!(signature = %self.signature, "counting wrapper installed");
                true
            }
            Err(err) => {
                warn!(signature = %self.signature, %err, "failed to install counting wrapper");
                false
            }
        }
    }

    pub fn is_patched(&self) -> bool {
        self.patched.load(Ordering::Acquire)
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn counter(&self) -> &Counter {
        &self.counter
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The summary line, `<target> called <n> times`.
    pub fn finalize(&self) -> String {
        format!("{} called {} times", self.signature, self.counter.render())
    }
}

impl Drop for Patcher {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.registry.unsubscribe(subscription);
        }
    }
}

impl fmt::Debug for Patcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Patcher")
            .field("target", &self.signature.raw())
            .field("kind", &self.strategy.kind())
            .field("patched", &self.is_patched())
            .field("count", &self.counter.get())
            .finish()
    }
}
