//! Save-game import and export
//!
//! The archive itself moves through the interpreter's virtual filesystem
//! (the page writes or downloads `savegames.zip`); these helpers only ask
//! the interpreter to pack or unpack it.

use crate::bridge::{Bridge, BridgeResult};

/// Name of the archive in the interpreter's working directory
pub const SAVES_ARCHIVE: &str = "savegames.zip";

const ZIP_SAVES: &str = "result = renpy.savelocation.zip_saves()";
const UNZIP_SAVES: &str = "result = renpy.savelocation.unzip_saves()";
const RESCAN_SAVES: &str = "renpy.loadsave.location.scan()";

/// How an import ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// Saves are unpacked and visible in the load menu
    Imported,
    /// Saves are unpacked but the running game did not pick them up
    RestartRequired(String),
}

impl ImportOutcome {
    /// Line to show the player
    pub fn message(&self) -> &'static str {
        match self {
            Self::Imported => "Saves imported successfully.",
            Self::RestartRequired(_) => "Saves imported - restart game to apply.",
        }
    }
}

/// Pack all saves into `SAVES_ARCHIVE`
///
/// Resolves with whether an archive was written.
pub async fn export_saves(bridge: &Bridge) -> BridgeResult<bool> {
    let written = bridge.exec(ZIP_SAVES).await?;
    Ok(is_truthy(&written))
}

/// Unpack `SAVES_ARCHIVE` and rescan the save directory
///
/// The caller flushes the filesystem between the two steps via
/// `before_rescan`; a failed rescan is not fatal, since the saves are
/// already on disk.
pub async fn import_saves<F, Fut>(bridge: &Bridge, before_rescan: F) -> BridgeResult<ImportOutcome>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = BridgeResult<()>>,
{
    bridge.exec(UNZIP_SAVES).await?;
    before_rescan().await?;

    match bridge.exec(RESCAN_SAVES).await {
        Ok(_) => Ok(ImportOutcome::Imported),
        Err(e) => {
            crate::console_error!("Cannot rescan saves folder: {}", e);
            Ok(ImportOutcome::RestartRequired(e.to_string()))
        }
    }
}

/// Python truthiness for what JSON can carry
fn is_truthy(value: &serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{BridgeConfig, Reply, SandboxPort};
    use futures::FutureExt;
    use futures::executor::block_on;
    use serde_json::json;

    /// Answer whatever is in the channel with `reply`
    fn answer(bridge: &Bridge, sandbox: &SandboxPort, reply: Reply) -> String {
        let env = sandbox.take_script().expect("script published");
        bridge.deliver(reply).unwrap();
        env.script().unwrap()
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!([1])));
    }

    #[test]
    fn test_export() {
        let (bridge, sandbox) = Bridge::in_memory(BridgeConfig::default());
        let mut fut = Box::pin(export_saves(&bridge));
        assert!((&mut fut).now_or_never().is_none());

        let script = answer(&bridge, &sandbox, Reply::success(None, json!(true)));
        assert_eq!(script, ZIP_SAVES);
        assert_eq!(block_on(fut), Ok(true));
    }

    #[test]
    fn test_export_nothing_to_save() {
        let (bridge, sandbox) = Bridge::in_memory(BridgeConfig::default());
        let mut fut = Box::pin(export_saves(&bridge));
        assert!((&mut fut).now_or_never().is_none());
        answer(&bridge, &sandbox, Reply::success(None, json!(false)));
        assert_eq!(block_on(fut), Ok(false));
    }

    #[test]
    fn test_import_rescan_failure_is_soft() {
        let (bridge, sandbox) = Bridge::in_memory(BridgeConfig::default());
        let mut fut = Box::pin(import_saves(&bridge, || async { Ok(()) }));

        assert!((&mut fut).now_or_never().is_none());
        let script = answer(&bridge, &sandbox, Reply::success(None, json!(null)));
        assert_eq!(script, UNZIP_SAVES);

        assert!((&mut fut).now_or_never().is_none());
        let script = answer(
            &bridge,
            &sandbox,
            Reply::failure(None, "AttributeError", "no location", ""),
        );
        assert_eq!(script, RESCAN_SAVES);

        let outcome = block_on(fut).unwrap();
        assert!(matches!(outcome, ImportOutcome::RestartRequired(_)));
        assert_eq!(outcome.message(), "Saves imported - restart game to apply.");
    }

    #[test]
    fn test_import_unzip_failure_is_hard() {
        let (bridge, sandbox) = Bridge::in_memory(BridgeConfig::default());
        let mut fut = Box::pin(import_saves(&bridge, || async { Ok(()) }));

        assert!((&mut fut).now_or_never().is_none());
        answer(
            &bridge,
            &sandbox,
            Reply::failure(None, "BadZipFile", "File is not a zip file", ""),
        );

        let err = block_on(fut).unwrap_err();
        assert_eq!(err.name(), "BadZipFile");
        assert!(bridge.is_idle());
    }
}
