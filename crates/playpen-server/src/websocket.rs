//! WebSocket protocol between the playground page and the dev server.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use playpen_preview::{FrameId, OpenedFile, PanelKind, PanelMessage};

/// Messages sent to the playground page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection established
    Connected,

    /// Project file list and the file open in the editor
    Workspace {
        files: Vec<String>,
        open: String,
    },

    /// A file was opened, or the open file changed on disk
    Opened {
        path: String,
        code: String,
        /// Editor mode for the file
        language: String,
    },

    /// A new preview frame is ready to load from `url`
    Preview { id: FrameId, url: String },

    /// Show the error panel
    Error { kind: PanelKind, message: String },

    /// Hide the error panel
    ClearError,
}

impl From<OpenedFile> for ServerMessage {
    fn from(file: OpenedFile) -> Self {
        Self::Opened {
            path: file.path,
            code: file.code,
            language: file.language,
        }
    }
}

impl From<Option<PanelMessage>> for ServerMessage {
    fn from(panel: Option<PanelMessage>) -> Self {
        match panel {
            Some(PanelMessage { kind, message }) => Self::Error { kind, message },
            None => Self::ClearError,
        }
    }
}

/// Messages received from the playground page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// New content for the open file
    Edit { code: String },

    /// Switch the editor to another file
    Open { path: String },

    /// A preview frame finished loading
    FrameLoaded { id: FrameId },

    /// The user closed the error panel
    DismissError,
}

/// Hub for broadcasting messages to all connected pages.
#[derive(Debug, Clone)]
pub struct HmrHub {
    sender: broadcast::Sender<ServerMessage>,
}

impl HmrHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send a message to all connected pages.
    pub fn send(&self, msg: ServerMessage) {
        // No receivers is fine
        let _ = self.sender.send(msg);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for HmrHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate the playground page script.
///
/// It keeps the editor, the file tabs and the error panel in sync with the
/// server, and swaps in a new sandboxed iframe for every preview frame. The
/// previous iframe stays visible until the new one has loaded.
pub fn hmr_client_script(ws_path: &str) -> String {
    format!(
        r#"
(function() {{
  'use strict';

  const url = (location.protocol === 'https:' ? 'wss://' : 'ws://') + location.host + '{}';
  const editor = document.getElementById('editor');
  const files = document.getElementById('files');
  const mode = document.getElementById('mode');
  const preview = document.getElementById('preview');
  const panel = document.getElementById('error-panel');
  const panelText = document.getElementById('error-text');
  const dismiss = document.getElementById('error-dismiss');

  let ws = null;
  let openPath = null;
  let reconnectAttempts = 0;
  const maxReconnectAttempts = 10;

  function send(msg) {{
    if (ws && ws.readyState === WebSocket.OPEN) {{
      ws.send(JSON.stringify(msg));
    }}
  }}

  function markActive() {{
    files.querySelectorAll('.tab').forEach(function(tab) {{
      tab.classList.toggle('active', tab.dataset.path === openPath);
    }});
  }}

  function renderFiles(paths) {{
    files.textContent = '';
    paths.forEach(function(path) {{
      const tab = document.createElement('button');
      tab.className = 'tab';
      tab.dataset.path = path;
      tab.textContent = path;
      tab.addEventListener('click', function() {{
        send({{ type: 'open', path: path }});
      }});
      files.appendChild(tab);
    }});
    markActive();
  }}

  function showFrame(id, src) {{
    const frame = document.createElement('iframe');
    frame.setAttribute('sandbox', 'allow-scripts');
    frame.title = 'Preview';
    frame.addEventListener('load', function() {{
      send({{ type: 'frame_loaded', id: id }});
      preview.querySelectorAll('iframe').forEach(function(old) {{
        if (old !== frame) {{
          old.remove();
        }}
      }});
      frame.classList.add('visible');
    }});
    frame.src = src;
    preview.appendChild(frame);
  }}

  editor.addEventListener('input', function() {{
    send({{ type: 'edit', code: editor.value }});
  }});

  dismiss.addEventListener('click', function() {{
    panel.hidden = true;
    send({{ type: 'dismiss_error' }});
  }});

  function connect() {{
    ws = new WebSocket(url);

    ws.onopen = function() {{
      console.log('[playpen] Connected');
      reconnectAttempts = 0;
    }};

    ws.onmessage = function(event) {{
      const msg = JSON.parse(event.data);

      switch (msg.type) {{
        case 'connected':
          console.log('[playpen] Server acknowledged connection');
          break;

        case 'workspace':
          openPath = msg.open;
          renderFiles(msg.files);
          break;

        case 'opened':
          openPath = msg.path;
          if (editor.value !== msg.code) {{
            editor.value = msg.code;
          }}
          mode.textContent = msg.path + ' (' + msg.language + ')';
          markActive();
          break;

        case 'preview':
          showFrame(msg.id, msg.url);
          break;

        case 'error':
          panelText.textContent = msg.message;
          panel.dataset.kind = msg.kind;
          panel.hidden = false;
          break;

        case 'clear_error':
          panel.hidden = true;
          break;
      }}
    }};

    ws.onclose = function() {{
      console.log('[playpen] Disconnected');
      if (reconnectAttempts < maxReconnectAttempts) {{
        reconnectAttempts++;
        setTimeout(connect, 1000 * reconnectAttempts);
      }}
    }};

    ws.onerror = function(e) {{
      console.error('[playpen] WebSocket error:', e);
    }};
  }}

  connect();
}})();
"#,
        ws_path
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hub_broadcasts_messages() {
        let hub = HmrHub::new();
        let mut rx = hub.subscribe();

        hub.send(ServerMessage::ClearError);

        match rx.try_recv() {
            Ok(ServerMessage::ClearError) => {}
            other => panic!("Expected ClearError, got {:?}", other),
        }
    }

    #[test]
    fn serializes_messages_with_type_tag() {
        let msg = ServerMessage::Workspace {
            files: vec!["/src/main.ts".to_string()],
            open: "/src/main.ts".to_string(),
        };

        let json = serde_json::to_string(&msg).unwrap();

        assert_eq!(
            json,
            r#"{"type":"workspace","files":["/src/main.ts"],"open":"/src/main.ts"}"#
        );
    }

    #[test]
    fn panel_state_maps_to_error_messages() {
        let shown = ServerMessage::from(Some(PanelMessage {
            kind: PanelKind::Compile,
            message: "Compilation Error:\nboom".to_string(),
        }));
        let json = serde_json::to_string(&shown).unwrap();
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains(r#""kind":"compile""#));

        assert_eq!(ServerMessage::from(None), ServerMessage::ClearError);
    }

    #[test]
    fn parses_client_messages() {
        let edit: ClientMessage =
            serde_json::from_str(r#"{"type":"edit","code":"let a = 1;"}"#).unwrap();
        assert_eq!(
            edit,
            ClientMessage::Edit {
                code: "let a = 1;".to_string()
            }
        );

        let id = FrameId::new();
        let loaded: ClientMessage =
            serde_json::from_str(&format!(r#"{{"type":"frame_loaded","id":"{}"}}"#, id)).unwrap();
        assert_eq!(loaded, ClientMessage::FrameLoaded { id });

        let dismiss: ClientMessage = serde_json::from_str(r#"{"type":"dismiss_error"}"#).unwrap();
        assert_eq!(dismiss, ClientMessage::DismissError);
    }

    #[test]
    fn client_script_targets_socket_path() {
        let script = hmr_client_script("/__hmr");

        assert!(script.contains("location.host + '/__hmr'"));
        assert!(script.contains("'allow-scripts'"));
    }
}
