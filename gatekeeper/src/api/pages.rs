use std::net::IpAddr;
use std::path::Path;
use crate::gate::{ConfigStatus, GateFile};

const HTML_DOCTYPE: &str =
    r#"<!DOCTYPE HTML PUBLIC "-//W3C//DTD HTML 4.01//EN" "http://www.w3.org/TR/html4/strict.dtd">"#;
const HTML_META: &str = r#"<meta http-equiv="Content-Type" content="text/html;charset=utf-8">"#;
const CSS: &str = "
body { font-family: sans-serif; margin: auto; max-width: 600pt; padding: 20pt; }
h1 { font-size: 200%; }
";

pub const DONE_PAGE: &str = "Done";

/// Page served on `/` for the given configuration state
pub fn page_for(gate: &GateFile, server_ip: Option<IpAddr>) -> String {
    match gate.status() {
        ConfigStatus::CanNotCreate | ConfigStatus::Unreadable => no_permission_page(gate.path()),
        ConfigStatus::NotFound | ConfigStatus::Empty => welcome_page(gate.path(), server_ip),
        ConfigStatus::ReadSuccessfully => DONE_PAGE.to_string(),
    }
}

pub fn no_permission_page(config_path: &Path) -> String {
    let body = format!(
        "<h1>Gatekeeper can not proceed!</h1>
            <p>The Gatekeeper has no writing access to its configuration file: <code>{}</code>. \
             Please stop the server and grant it the proper permissions</p>",
        escape(&config_path.display().to_string())
    );
    document(&body)
}

pub fn welcome_page(config_path: &Path, server_ip: Option<IpAddr>) -> String {
    let reached_at = match server_ip {
        Some(ip) => format!(
            "<p>The server was reached at IP <code>{}</code>. May we assume this IP address to be \
             the client network address? If not, open the Gatekeeper page from the client network.</p>",
            ip
        ),
        None => String::new(),
    };

    let body = format!(
        "<h1>Welcome to the Gatekeeper!</h1>
            <p>The server can not find its configuration file at <code>{}</code> or the file is \
             empty. We have to configure the Gatekeeper.</p>
            {}",
        escape(&config_path.display().to_string()),
        reached_at
    );
    document(&body)
}

fn document(body: &str) -> String {
    format!(
        "{HTML_DOCTYPE}
<html>
    <head>
        {HTML_META}
        <title>The Gatekeeper</title>
        <style>{CSS}</style>
    </head>
    <body>
        {body}
    </body>
</html>
"
    )
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
