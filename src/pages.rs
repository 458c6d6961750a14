//! HTML for the dashboard and the QR pairing page.

use wagate_core::group::GroupSummary;

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; max-width: 720px; margin: 2rem auto; padding: 0 1rem; color: #222; }
h1 { font-size: 1.4rem; }
.status { padding: .6rem 1rem; border-radius: 6px; margin: 1rem 0; }
.status.on { background: #e3f6e8; color: #14632b; }
.status.off { background: #fdecea; color: #8a1c12; }
table { border-collapse: collapse; width: 100%; }
th, td { text-align: left; padding: .4rem .5rem; border-bottom: 1px solid #eee; }
td.id { font-family: monospace; font-size: .85rem; color: #555; }
button { padding: .4rem 1rem; cursor: pointer; }
img.qr { display: block; margin: 1rem auto; image-rendering: pixelated; }
"#;

/// Mirrors `/ws` status events into `#status`; reloads on connect so the
/// page swaps from QR to dashboard.
const LIVE_SCRIPT: &str = r#"
(function () {
  var el = document.getElementById('status');
  var proto = location.protocol === 'https:' ? 'wss://' : 'ws://';
  function open() {
    var ws = new WebSocket(proto + location.host + '/ws');
    ws.onmessage = function (e) {
      var msg = JSON.parse(e.data);
      if (msg.event === 'status') {
        el.textContent = msg.data.message;
        el.className = 'status ' + (msg.data.connected ? 'on' : 'off');
        if (msg.data.connected && el.dataset.connected !== 'true') { location.reload(); }
      } else if (msg.event === 'qr' && document.getElementById('qr')) {
        location.reload();
      }
    };
    ws.onclose = function () { setTimeout(open, 3000); };
  }
  open();
})();
"#;

/// Escape text for inclusion in HTML element content or attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, connected: bool, status: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
         <h1>{title}</h1>\n\
         <div id=\"status\" class=\"status {class}\" data-connected=\"{connected}\">{status}</div>\n\
         {body}\n<script>{LIVE_SCRIPT}</script>\n</body>\n</html>\n",
        title = escape_html(title),
        class = if connected { "on" } else { "off" },
        status = escape_html(status),
    )
}

/// Pairing page for `/qr`. `qr_data_uri` is a `data:image/png;base64,...` URI.
pub fn qr_page(qr_data_uri: &str) -> String {
    let body = format!(
        "<p>Open WhatsApp on your phone, go to <b>Linked devices</b> and scan this code.</p>\n\
         <img id=\"qr\" class=\"qr\" src=\"{}\" alt=\"WhatsApp pairing QR code\">\n\
         <p><a href=\"/\">Back to dashboard</a></p>",
        escape_html(qr_data_uri)
    );
    layout(
        "WhatsApp pairing",
        false,
        crate::gateway::SCAN_PROMPT,
        &body,
    )
}

/// Dashboard for `/`.
pub fn dashboard(connected: bool, qr_pending: bool, groups: &[GroupSummary]) -> String {
    if !connected {
        let body = if qr_pending {
            "<p><a href=\"/qr\">Scan the pairing QR code</a> to link this gateway.</p>".to_string()
        } else {
            "<p>Waiting for the WhatsApp session. A pairing code will appear at \
             <a href=\"/qr\">/qr</a> when one is issued.</p>"
                .to_string()
        };
        return layout("WhatsApp gateway", false, "Disconnected", &body);
    }

    let mut rows = String::new();
    for group in groups {
        rows.push_str(&format!(
            "<tr><td>{}</td><td class=\"id\">{}</td><td>{}</td></tr>\n",
            escape_html(&group.name),
            escape_html(&group.id),
            group.participants
        ));
    }
    if groups.is_empty() {
        rows.push_str("<tr><td colspan=\"3\">No groups cached yet.</td></tr>\n");
    }

    let body = format!(
        "<h2>Groups ({count})</h2>\n\
         <button id=\"refresh\">Refresh groups</button>\n\
         <table>\n<thead><tr><th>Name</th><th>ID</th><th>Participants</th></tr></thead>\n\
         <tbody>\n{rows}</tbody>\n</table>\n\
         <script>document.getElementById('refresh').onclick = function () {{\n\
           this.disabled = true;\n\
           fetch('/refresh-groups', {{ method: 'POST' }})\n\
             .then(function (r) {{ return r.json(); }})\n\
             .then(function (j) {{ if (!j.success) {{ alert(j.message); }} location.reload(); }});\n\
         }};</script>",
        count = groups.len(),
    );
    layout("WhatsApp gateway", true, crate::gateway::CONNECTED_MESSAGE, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_dashboard_disconnected_links_qr() {
        let html = dashboard(false, true, &[]);
        assert!(html.contains("href=\"/qr\""));
        assert!(!html.contains("Refresh groups"));
    }

    #[test]
    fn test_dashboard_connected_lists_escaped_groups() {
        let groups = vec![GroupSummary {
            id: "A@g.us".into(),
            name: "<Team>".into(),
            participants: 5,
            created_at: None,
        }];
        let html = dashboard(true, false, &groups);
        assert!(html.contains("&lt;Team&gt;"));
        assert!(html.contains("A@g.us"));
        assert!(html.contains("Refresh groups"));
        assert!(html.contains("Groups (1)"));
    }

    #[test]
    fn test_qr_page_embeds_image() {
        let html = qr_page("data:image/png;base64,AAAA");
        assert!(html.contains("src=\"data:image/png;base64,AAAA\""));
        assert!(html.contains("new WebSocket"));
    }
}
