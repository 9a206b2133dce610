//! WS-Management SOAP envelopes and response extraction.
//!
//! Envelopes are built from templates; responses are walked with quick-xml
//! and reduced to the handful of values the executor cares about (shell id,
//! command id, stream chunks, command state, fault text).

use quick_xml::events::Event;
use quick_xml::Reader;
use uuid::Uuid;

const SHELL_RESOURCE_URI: &str = "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/cmd";

const ACTION_CREATE: &str = "http://schemas.xmlsoap.org/ws/2004/09/transfer/Create";
const ACTION_DELETE: &str = "http://schemas.xmlsoap.org/ws/2004/09/transfer/Delete";
const ACTION_COMMAND: &str =
    "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/Command";
const ACTION_RECEIVE: &str =
    "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/Receive";
const ACTION_SIGNAL: &str = "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/Signal";

fn envelope(endpoint: &str, action: &str, shell_id: Option<&str>, body: &str) -> String {
    let selector = match shell_id {
        Some(id) => format!(
            "<w:SelectorSet><w:Selector Name=\"ShellId\">{}</w:Selector></w:SelectorSet>",
            id
        ),
        None => String::new(),
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope"
            xmlns:a="http://schemas.xmlsoap.org/ws/2004/08/addressing"
            xmlns:w="http://schemas.dmtf.org/wbem/wsman/1/wsman.xsd"
            xmlns:rsp="http://schemas.microsoft.com/wbem/wsman/1/windows/shell">
  <s:Header>
    <a:To>{endpoint}</a:To>
    <a:ReplyTo>
      <a:Address s:mustUnderstand="true">http://schemas.xmlsoap.org/ws/2004/08/addressing/role/anonymous</a:Address>
    </a:ReplyTo>
    <a:Action s:mustUnderstand="true">{action}</a:Action>
    <a:MessageID>uuid:{message_id}</a:MessageID>
    <w:ResourceURI s:mustUnderstand="true">{resource}</w:ResourceURI>
    <w:MaxEnvelopeSize s:mustUnderstand="true">512000</w:MaxEnvelopeSize>
    <w:OperationTimeout>PT30S</w:OperationTimeout>
    {selector}
  </s:Header>
  <s:Body>{body}</s:Body>
</s:Envelope>"#,
        endpoint = endpoint,
        action = action,
        message_id = Uuid::new_v4(),
        resource = SHELL_RESOURCE_URI,
        selector = selector,
        body = body,
    )
}

pub fn create_shell(endpoint: &str) -> String {
    let body = r#"<rsp:Shell>
      <rsp:InputStreams>stdin</rsp:InputStreams>
      <rsp:OutputStreams>stdout stderr</rsp:OutputStreams>
    </rsp:Shell>"#;
    envelope(endpoint, ACTION_CREATE, None, body)
}

/// Run `powershell.exe -EncodedCommand` inside an open shell. The script
/// itself travels base64-encoded, so no escaping of its content is needed
/// at this layer.
pub fn command(endpoint: &str, shell_id: &str, encoded_command: &str) -> String {
    let body = format!(
        r#"<rsp:CommandLine>
      <rsp:Command>powershell.exe</rsp:Command>
      <rsp:Arguments>-NoProfile</rsp:Arguments>
      <rsp:Arguments>-NonInteractive</rsp:Arguments>
      <rsp:Arguments>-EncodedCommand</rsp:Arguments>
      <rsp:Arguments>{}</rsp:Arguments>
    </rsp:CommandLine>"#,
        encoded_command
    );
    envelope(endpoint, ACTION_COMMAND, Some(shell_id), &body)
}

pub fn receive(endpoint: &str, shell_id: &str, command_id: &str) -> String {
    let body = format!(
        r#"<rsp:Receive><rsp:DesiredStream CommandId="{}">stdout stderr</rsp:DesiredStream></rsp:Receive>"#,
        command_id
    );
    envelope(endpoint, ACTION_RECEIVE, Some(shell_id), &body)
}

pub fn signal_terminate(endpoint: &str, shell_id: &str, command_id: &str) -> String {
    let body = format!(
        r#"<rsp:Signal CommandId="{}"><rsp:Code>http://schemas.microsoft.com/wbem/wsman/1/windows/shell/signal/terminate</rsp:Code></rsp:Signal>"#,
        command_id
    );
    envelope(endpoint, ACTION_SIGNAL, Some(shell_id), &body)
}

pub fn delete_shell(endpoint: &str, shell_id: &str) -> String {
    envelope(endpoint, ACTION_DELETE, Some(shell_id), "")
}

/// Text content of the first element with the given local name.
pub fn element_text(xml: &str, local_name: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    let mut inside = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == local_name.as_bytes() => {
                inside = true;
            }
            Ok(Event::Text(t)) if inside => {
                return t.unescape().ok().map(|s| s.into_owned());
            }
            Ok(Event::End(_)) if inside => {
                // Element was empty.
                return None;
            }
            Ok(Event::Eof) => return None,
            Err(_) => return None,
            _ => {}
        }
    }
}

/// Base64 stream chunks from a Receive response, as (stream_name, chunk)
/// pairs in document order.
pub fn stream_chunks(xml: &str) -> Vec<(String, String)> {
    let mut reader = Reader::from_str(xml);
    let mut chunks = Vec::new();
    let mut current: Option<String> = None;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"Stream" => {
                current = e
                    .attributes()
                    .flatten()
                    .find(|attr| attr.key.as_ref() == b"Name")
                    .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()));
            }
            Ok(Event::Text(t)) => {
                if let Some(name) = current.as_ref() {
                    if let Ok(text) = t.unescape() {
                        chunks.push((name.clone(), text.into_owned()));
                    }
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"Stream" => {
                current = None;
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }
    chunks
}

/// Whether the Receive response reports the command as finished.
pub fn command_done(xml: &str) -> bool {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"CommandState" =>
            {
                let done = e
                    .attributes()
                    .flatten()
                    .find(|attr| attr.key.as_ref() == b"State")
                    .and_then(|attr| attr.unescape_value().ok())
                    .map(|state| state.ends_with("Done"))
                    .unwrap_or(false);
                if done {
                    return true;
                }
            }
            Ok(Event::Eof) => return false,
            Err(_) => return false,
            _ => {}
        }
    }
}

pub fn exit_code(xml: &str) -> Option<i32> {
    element_text(xml, "ExitCode").and_then(|code| code.trim().parse().ok())
}

/// Human-readable fault reason, if the response is a SOAP fault. An
/// operation-timeout fault is a normal part of the Receive polling loop and
/// is reported separately.
pub fn fault_text(xml: &str) -> Option<String> {
    if !xml.contains("Fault") {
        return None;
    }
    element_text(xml, "Text")
        .or_else(|| element_text(xml, "Reason"))
        .or_else(|| Some("unspecified WS-Management fault".to_string()))
}

pub fn is_operation_timeout(xml: &str) -> bool {
    xml.contains("TimedOut")
}
