//! Embedded HTML pages.

use std::fmt::Write as _;

pub const LOGIN_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>rawdrop: sign in</title></head>
<body>
<h1>Sign in</h1>
<form method="post" action="/login">
  <label>Username <input type="text" name="username" autofocus></label><br>
  <label>Password <input type="password" name="password"></label><br>
  <button type="submit">Sign in</button>
</form>
</body>
</html>
"#;

pub const UPLOAD_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>rawdrop: upload</title></head>
<body>
<h1>Upload</h1>
<p>NEF files are converted to JPEG in the background.</p>
<form method="post" action="/upload" enctype="multipart/form-data">
  <input type="file" name="file">
  <button type="submit">Upload</button>
</form>
<p><a href="/">Browse files</a></p>
<form method="post" action="/logout"><button type="submit">Sign out</button></form>
</body>
</html>
"#;

/// Render a listing of the media directory.
pub fn directory_listing(names: &[String]) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>rawdrop</title></head>\n<body>\n<h1>Files</h1>\n<p><a href=\"/upload\">Upload</a></p>\n<ul>\n",
    );
    for name in names {
        let _ = writeln!(
            html,
            "<li><a href=\"/{}\">{}</a></li>",
            percent_encode(name),
            escape_html(name)
        );
    }
    html.push_str("</ul>\n</body>\n</html>\n");
    html
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(b as char);
        } else {
            let _ = write!(out, "%{b:02X}");
        }
    }
    out
}
