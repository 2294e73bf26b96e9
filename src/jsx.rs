//! ExtendScript synthesis.
//!
//! Everything the bridge asks the host to evaluate is generated here: the
//! throwaway scripts used by direct invocation, the wake call for queued
//! invocation, and the consumer loop deployed into `Scripts/Startup`.
//!
//! The host runtime is ES3, so generated code sticks to `var`, plain
//! functions and `for` loops.

use crate::command::Command;
use crate::config::TimingConfig;
use crate::paths::BridgeDirs;

/// Script result when the active composition has a selection
pub const RESULT_BUSY: &str = "RB_BUSY";
/// Script result when an import needs an open composition and there is none
pub const RESULT_NO_SESSION: &str = "RB_NO_SESSION";
/// Wake result when the stop flag is present
pub const RESULT_PAUSED: &str = "RB_PAUSED";
pub const RESULT_OK: &str = "RB_OK";

/// Name of the project folder imported audio is filed under
pub const AUDIO_FOLDER_NAME: &str = "Audio";

/// Consumer loop template (included at compile time)
const EMBEDDED_STARTUP_SCRIPT: &str = include_str!("../assets/relay_bridge_startup.jsx");

/// Quote `value` as an ExtendScript string literal.
///
/// JSON string syntax is valid ES3 except for U+2028/U+2029, which ES3
/// treats as line terminators inside literals.
pub fn js_string(value: &str) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "\"\"".to_string())
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

/// Script for direct invocation of `command` in the live session
pub fn direct_script(command: &Command) -> String {
    match command {
        Command::ImportAudio {
            path,
            requires_active_session,
        } => import_audio_script(&path.to_string_lossy(), *requires_active_session),
        Command::RunScriptText { code } => code.clone(),
        Command::RunScriptFile { path } => format!(
            "$.evalFile(new File({}));\n",
            js_string(&path.to_string_lossy())
        ),
    }
}

fn import_audio_script(path: &str, requires_active_session: bool) -> String {
    format!(
        r#"(function () {{
    var path = {path};
    var requireSession = {require};
    var comp = app.project ? app.project.activeItem : null;
    var hasComp = comp !== null && comp instanceof CompItem;
    if (hasComp && comp.selectedLayers.length > 0) {{
        return {busy};
    }}
    if (requireSession && !hasComp) {{
        return {no_session};
    }}
    app.beginUndoGroup("Relay Bridge: Import Audio");
    try {{
        var folder = null;
        var footage = null;
        var file = new File(path);
        for (var i = 1; i <= app.project.numItems; i++) {{
            var item = app.project.item(i);
            if (folder === null && item instanceof FolderItem && item.name === {folder}) {{
                folder = item;
            }}
            if (footage === null && item instanceof FootageItem && item.file && item.file.fsName === file.fsName) {{
                footage = item;
            }}
        }}
        if (folder === null) {{
            folder = app.project.items.addFolder({folder});
        }}
        if (footage === null) {{
            footage = app.project.importFile(new ImportOptions(file));
            footage.parentFolder = folder;
        }}
        if (hasComp) {{
            comp.layers.add(footage);
        }}
    }} finally {{
        app.endUndoGroup();
    }}
    return {ok};
}})();
"#,
        path = js_string(path),
        require = requires_active_session,
        busy = js_string(RESULT_BUSY),
        no_session = js_string(RESULT_NO_SESSION),
        folder = js_string(AUDIO_FOLDER_NAME),
        ok = js_string(RESULT_OK),
    )
}

/// Nudge the installed consumer loop to tick now instead of on its timer.
///
/// Runs the consumer's own gate checks first and answers `RB_PAUSED` or
/// `RB_BUSY` instead of ticking, so the caller learns why nothing will run.
pub fn wake_script(dirs: &BridgeDirs) -> String {
    format!(
        r#"(function () {{
    if (new File({stop_flag}).exists) {{
        return {paused};
    }}
    var comp = app.project ? app.project.activeItem : null;
    if (comp !== null && comp instanceof CompItem && comp.selectedLayers.length > 0) {{
        return {busy};
    }}
    if (typeof $.global.relayBridgeTick === "function") {{
        $.global.relayBridgeTick();
    }}
    return {ok};
}})();
"#,
        stop_flag = js_string(&dirs.stop_flag().to_string_lossy()),
        paused = js_string(RESULT_PAUSED),
        busy = js_string(RESULT_BUSY),
        ok = js_string(RESULT_OK),
    )
}

/// Drop-file body for a script command (`<queue>/<id>.jsx`)
pub fn drop_script_body(command: &Command) -> Option<String> {
    match command {
        Command::ImportAudio { .. } => None,
        other => Some(direct_script(other)),
    }
}

/// Consumer loop with this installation's directories and timings filled in
pub fn render_startup_script(dirs: &BridgeDirs, timing: &TimingConfig) -> String {
    EMBEDDED_STARTUP_SCRIPT
        .replace(
            "__RB_QUEUE_DIR__",
            &js_string(&dirs.queue_dir().to_string_lossy()),
        )
        .replace(
            "__RB_JOBS_DIR__",
            &js_string(&dirs.jobs_dir().to_string_lossy()),
        )
        .replace("__RB_TICK_MS__", &timing.tick_interval_ms.to_string())
        .replace("__RB_TTL_MS__", &timing.job_ttl_ms.to_string())
}
