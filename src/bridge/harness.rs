//! Sandbox-side harness
//!
//! The interpreter's main loop polls a window variable and executes
//! whatever Python source it finds there. The harness is that source: a
//! fixed prelude plus a single call carrying the base64 envelope. The
//! prelude decodes the envelope, binds its values, runs the script, and
//! reports the output variable (or the exception) to the result callback.
//!
//! Only base64 text is ever interpolated, so script bodies cannot escape
//! the wrapper no matter what quotes or escape sequences they contain.

use super::error::BridgeResult;
use super::wire::Envelope;

/// Python prelude defining `_bridge_run`
///
/// `{callback}` is substituted with the name of the JS result callback.
const PRELUDE: &str = r#"import base64, emscripten, json, traceback

def _bridge_run(payload):
    request = json.loads(base64.b64decode(payload).decode('utf-8'))
    reply = dict(id=request['id'])
    try:
        scope = globals()
        scope.update(request.get('bindings', {}))
        scope[request['output']] = None
        exec(base64.b64decode(request['source']).decode('utf-8'), scope)
        reply['data'] = scope.get(request['output'])
        text = json.dumps(reply)
    except Exception as e:
        reply.pop('data', None)
        reply.update(error=str(e), name=e.__class__.__name__, traceback=traceback.format_exc())
        text = json.dumps(reply)
    emscripten.run_script('{callback}(%s)' % (json.dumps(text),))
"#;

/// Render the source the sandbox executes for one envelope
pub fn render(envelope: &Envelope, callback: &str) -> BridgeResult<String> {
    let payload = envelope.to_transport()?;
    let mut source = PRELUDE.replace("{callback}", callback);
    source.push_str("\n_bridge_run('");
    source.push_str(&payload);
    source.push_str("')\n");
    Ok(source)
}

/// Recover the envelope from rendered harness source
///
/// Used by in-process sandboxes that consume the same text the browser
/// one would.
pub fn extract(source: &str) -> BridgeResult<Envelope> {
    let payload = source
        .rsplit_once("_bridge_run('")
        .and_then(|(_, rest)| rest.split_once("')"))
        .map(|(payload, _)| payload)
        .ok_or_else(|| super::error::BridgeError::Decode("no harness call found".to_string()))?;
    Envelope::from_transport(payload)
}
