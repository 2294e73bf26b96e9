//! In-memory fakes for the host, its process probe and the automation
//! entry point.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::automation::{Automation, InvocationOutput, ProcessProbe};
use crate::consumer::{HostError, HostRuntime, ItemId};
use crate::error::{BridgeError, Result};

// =============================================================================
// HOST
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct FakeMedia {
    pub path: PathBuf,
    pub bin: ItemId,
}

/// A project with folders, footage and one optional timeline
#[derive(Debug, Default)]
pub struct FakeHost {
    pub selection: bool,
    pub timeline_open: bool,
    pub bins: Vec<String>,
    pub media: Vec<FakeMedia>,
    /// Media ids referenced by the active timeline, in order
    pub timeline: Vec<ItemId>,
    pub evaluated: Vec<String>,
    /// Number of upcoming `eval_script` calls that throw
    pub failing_evals: usize,
    pub failing_imports: usize,
    pub undo_groups: Vec<String>,
    pub open_undo_groups: usize,
}

impl FakeHost {
    pub fn with_timeline() -> Self {
        FakeHost {
            timeline_open: true,
            ..Default::default()
        }
    }
}

impl HostRuntime for FakeHost {
    fn has_active_selection(&self) -> bool {
        self.selection
    }

    fn has_active_timeline(&self) -> bool {
        self.timeline_open
    }

    fn begin_undo_group(&mut self, name: &str) {
        self.undo_groups.push(name.to_string());
        self.open_undo_groups += 1;
    }

    fn end_undo_group(&mut self) {
        self.open_undo_groups = self.open_undo_groups.saturating_sub(1);
    }

    fn find_bin(&self, name: &str) -> Option<ItemId> {
        self.bins
            .iter()
            .position(|b| b == name)
            .map(|i| ItemId(i as u64))
    }

    fn create_bin(&mut self, name: &str) -> std::result::Result<ItemId, HostError> {
        self.bins.push(name.to_string());
        Ok(ItemId((self.bins.len() - 1) as u64))
    }

    fn find_media(&self, path: &Path) -> Option<ItemId> {
        self.media
            .iter()
            .position(|m| m.path == path)
            .map(|i| ItemId(i as u64))
    }

    fn import_media(&mut self, path: &Path, bin: ItemId) -> std::result::Result<ItemId, HostError> {
        if self.failing_imports > 0 {
            self.failing_imports -= 1;
            return Err(HostError::Import {
                path: path.display().to_string(),
                message: "unsupported file".to_string(),
            });
        }
        self.media.push(FakeMedia {
            path: path.to_path_buf(),
            bin,
        });
        Ok(ItemId((self.media.len() - 1) as u64))
    }

    fn append_to_timeline(&mut self, media: ItemId) -> std::result::Result<(), HostError> {
        self.timeline.push(media);
        Ok(())
    }

    fn eval_script(&mut self, code: &str) -> std::result::Result<(), HostError> {
        if self.failing_evals > 0 {
            self.failing_evals -= 1;
            return Err(HostError::Script("ReferenceError: boom".to_string()));
        }
        self.evaluated.push(code.to_string());
        Ok(())
    }
}

// =============================================================================
// PROBE
// =============================================================================

#[derive(Debug, Default)]
pub struct FakeProbe {
    running: AtomicBool,
}

impl FakeProbe {
    pub fn new(running: bool) -> Arc<Self> {
        Arc::new(FakeProbe {
            running: AtomicBool::new(running),
        })
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }
}

impl ProcessProbe for FakeProbe {
    fn is_process_running(&self, _name: &str) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

// =============================================================================
// AUTOMATION
// =============================================================================

type InvokeHook = Box<dyn Fn(&Path) -> Option<String> + Send + Sync>;

/// Records every invocation; replies with a fixed output
pub struct FakeAutomation {
    output: Mutex<InvocationOutput>,
    fail_spawn: AtomicBool,
    /// (script path, script text as it was on disk during the call)
    pub invoked: Mutex<Vec<(PathBuf, String)>>,
    pub launches: Mutex<Vec<Vec<String>>>,
    on_invoke: Mutex<Option<InvokeHook>>,
    /// Probe flipped to running by `launch`
    launch_probe: Mutex<Option<Arc<FakeProbe>>>,
}

impl Default for FakeAutomation {
    fn default() -> Self {
        Self::replying(Some(0), "")
    }
}

impl FakeAutomation {
    pub fn replying(status: Option<i32>, stdout: &str) -> Self {
        FakeAutomation {
            output: Mutex::new(InvocationOutput {
                status,
                stdout: stdout.to_string(),
                stderr: String::new(),
            }),
            fail_spawn: AtomicBool::new(false),
            invoked: Mutex::new(Vec::new()),
            launches: Mutex::new(Vec::new()),
            on_invoke: Mutex::new(None),
            launch_probe: Mutex::new(None),
        }
    }

    pub fn failing_spawn() -> Self {
        let automation = Self::default();
        automation.fail_spawn.store(true, Ordering::SeqCst);
        automation
    }

    /// Run `hook` during each invoke, after the script has been recorded.
    /// A returned string replaces the canned stdout for that call.
    pub fn on_invoke(&self, hook: impl Fn(&Path) -> Option<String> + Send + Sync + 'static) {
        *self.on_invoke.lock() = Some(Box::new(hook));
    }

    pub fn launch_starts(&self, probe: Arc<FakeProbe>) {
        *self.launch_probe.lock() = Some(probe);
    }

    pub fn invocation_count(&self) -> usize {
        self.invoked.lock().len()
    }
}

impl Automation for FakeAutomation {
    fn invoke(&self, script: &Path) -> Result<InvocationOutput> {
        if self.fail_spawn.load(Ordering::SeqCst) {
            return Err(BridgeError::AutomationInvocation {
                message: "failed to spawn \"osascript\"".to_string(),
                status: None,
            });
        }
        let text = std::fs::read_to_string(script).unwrap_or_default();
        self.invoked.lock().push((script.to_path_buf(), text));
        let mut output = self.output.lock().clone();
        if let Some(hook) = self.on_invoke.lock().as_ref() {
            if let Some(stdout) = hook(script) {
                output.stdout = stdout;
            }
        }
        Ok(output)
    }

    fn launch(&self, args: &[String]) -> Result<()> {
        self.launches.lock().push(args.to_vec());
        if let Some(probe) = self.launch_probe.lock().as_ref() {
            probe.set_running(true);
        }
        Ok(())
    }
}
