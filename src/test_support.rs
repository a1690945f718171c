//! Fixtures for tests that drive a real browser
//!
//! Pages are served from a loopback listener so no test touches the
//! network. Browser tests are `#[ignore]`d by default and also return early
//! when no Chrome/Chromium can be resolved.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::{Config, resolve_browser_executable};

/// Bytes served as the thesis PDF
pub const PDF_BYTES: &[u8] = b"%PDF-1.4\n1 0 obj <<>> endobj\ntrailer <<>>\n%%EOF\n";

#[derive(Clone)]
pub struct Route {
    content_type: &'static str,
    body: Vec<u8>,
    attachment: Option<&'static str>,
}

impl Route {
    pub fn html(body: &str) -> Self {
        Self {
            content_type: "text/html; charset=utf-8",
            body: body.as_bytes().to_vec(),
            attachment: None,
        }
    }

    pub fn pdf(filename: &'static str) -> Self {
        Self {
            content_type: "application/pdf",
            body: PDF_BYTES.to_vec(),
            attachment: Some(filename),
        }
    }
}

pub struct FixtureServer {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl FixtureServer {
    pub async fn start(routes: Vec<(&'static str, Route)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes: Arc<HashMap<&'static str, Route>> = Arc::new(routes.into_iter().collect());

        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, routes.clone()));
            }
        });

        Self { addr, task }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for FixtureServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(mut stream: TcpStream, routes: Arc<HashMap<&'static str, Route>>) {
    let mut request = Vec::new();
    let mut chunk = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&chunk[..n]),
        }
    }

    let request = String::from_utf8_lossy(&request);
    let target = request.split_whitespace().nth(1).unwrap_or("/");
    let path = target.split('?').next().unwrap_or("/");

    let (status, route) = match routes.get(path) {
        Some(route) => ("200 OK", route.clone()),
        None => ("404 Not Found", Route::html("not found")),
    };

    let mut head = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        status,
        route.content_type,
        route.body.len()
    );
    if let Some(filename) = route.attachment {
        head.push_str(&format!("Content-Disposition: attachment; filename=\"{}\"\r\n", filename));
    }
    head.push_str("\r\n");

    let _ = stream.write_all(head.as_bytes()).await;
    let _ = stream.write_all(&route.body).await;
    let _ = stream.shutdown().await;
}

/// Whether a browser can be launched on this machine
pub fn browser_available() -> bool {
    resolve_browser_executable(&Config::default().browser).is_ok()
}

/// Headless config with short waits, saving downloads into `download_dir`
pub fn browser_test_config(download_dir: &Path) -> Config {
    let mut config = Config::default();
    config.browser.download_dir = Some(download_dir.to_path_buf());
    config.timeouts.navigation_ms = 20_000;
    config.timeouts.element_ms = 3_000;
    config.timeouts.download_start_ms = 15_000;
    config.timeouts.download_complete_ms = 15_000;
    config.timeouts.session_ms = 60_000;
    config
}

/// Detail page with one abstract block and the given extra markup
pub fn detail_page(body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>Detail</title></head>
<body>
  <h1>Strojové učenie v medicíne</h1>
  <div class="abstract">Práca sa zaoberá strojovým učením.</div>
  {body}
</body></html>"#
    )
}

/// Cookie banner variants for the PDF detail page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Banner {
    Absent,
    /// In the DOM, never displayed
    Hidden,
    /// Full-viewport overlay shown together with the download dialog;
    /// the confirmation link is unclickable until it is dismissed
    Visible,
}

/// Detail page whose PDF link opens a dialog holding the real download link
pub fn pdf_detail_page(banner: Banner) -> String {
    let bar = match banner {
        Banner::Absent => String::new(),
        Banner::Hidden | Banner::Visible => format!(
            r#"<div id="cookie-bar" data-show="{show}"
       style="display:none; position:fixed; top:0; left:0; width:100vw; height:100vh; z-index:1000; background:rgba(0,0,0,0.5)">
    <button id="cookie-consent-accept" onclick="document.getElementById('cookie-bar').remove()">Súhlasím</button>
  </div>"#,
            show = if banner == Banner::Visible { "yes" } else { "no" }
        ),
    };

    detail_page(&format!(
        r##"<a href="#" id="open-pdf" onclick="
      document.getElementById('dialog').style.display = 'block';
      const bar = document.getElementById('cookie-bar');
      if (bar && bar.dataset.show === 'yes') bar.style.display = 'block';
      return false;">Stiahnuť PDF</a>
  <div id="dialog" style="display:none">
    <a class="btn-primary" href="/files/thesis.pdf" download>Stiahnuť</a>
  </div>
  {bar}"##
    ))
}

pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}
