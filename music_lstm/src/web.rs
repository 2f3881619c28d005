// ブラウザから曲を選んで生成するための小さなHTTPフロントエンド。
// 利用者ごとの状態はクッキーで引いたSessionに置き、ハンドラへ明示的に渡す。

use crate::config::{GenerateSettings, MAX_SESSIONS, OUTPUT_FILE, REQUIRED_SELECTIONS};
use crate::corpus::load_notes;
use crate::error::{CorpusError, Result};
use crate::inference::run_generation;
use crate::midi::{midi_bytes, write_midi};
use crate::session::Session;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::{HashMap, VecDeque};
use std::io::Read;
use std::path::{Path, PathBuf};
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use tracing::{debug, error, info, warn};

const SESSION_COOKIE: &str = "music_lstm_session";

/// ハンドラの結果
#[derive(Debug, PartialEq)]
pub enum Reply {
    Page(String),
    Redirect,
    NotFound,
}

/// 生成に必要な共有設定とセッション表
pub struct WebApp {
    files: Vec<PathBuf>,
    load_dir: PathBuf,
    backend: String,
    settings: GenerateSettings,
    output: PathBuf,
    sessions: HashMap<String, Session>,
    /// 最近使った順（末尾が最新）
    recent: VecDeque<String>,
    max_sessions: usize,
    next_session: u64,
}

impl WebApp {
    pub fn new(
        files: Vec<PathBuf>,
        load_dir: &Path,
        backend: &str,
        settings: GenerateSettings,
    ) -> Self {
        Self {
            files,
            load_dir: load_dir.to_path_buf(),
            backend: backend.to_string(),
            settings,
            output: PathBuf::from(OUTPUT_FILE),
            sessions: HashMap::new(),
            recent: VecDeque::new(),
            max_sessions: MAX_SESSIONS,
            next_session: 0,
        }
    }

    pub fn with_output(mut self, output: &Path) -> Self {
        self.output = output.to_path_buf();
        self
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions.max(1);
        self
    }

    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// 既存のセッションIDを返すか、新しく作る
    ///
    /// 上限に達していれば最も長く使われていないセッションを捨てる。
    pub fn open_session(&mut self, cookie: Option<&str>) -> (String, bool) {
        if let Some(id) = cookie.filter(|id| self.sessions.contains_key(*id)) {
            self.touch(id);
            return (id.to_string(), false);
        }

        while self.sessions.len() >= self.max_sessions {
            match self.recent.pop_front() {
                Some(oldest) => {
                    self.sessions.remove(&oldest);
                    debug!("セッションを破棄: {}", oldest);
                }
                None => break,
            }
        }

        let id = format!("{:016x}{:08x}", rand::random::<u64>(), self.next_session);
        self.next_session += 1;
        self.sessions.insert(id.clone(), Session::new());
        self.recent.push_back(id.clone());
        (id, true)
    }

    fn touch(&mut self, id: &str) {
        if let Some(pos) = self.recent.iter().position(|r| r == id) {
            if let Some(entry) = self.recent.remove(pos) {
                self.recent.push_back(entry);
            }
        }
    }

    /// メソッドとURLに応じてセッションを更新する
    pub fn route(&mut self, method: &Method, url: &str, session_id: &str) -> Reply {
        let (path, query) = url.split_once('?').unwrap_or((url, ""));
        let total = self.files.len();

        match (method, path) {
            (Method::Get, "/") => match self.sessions.get(session_id) {
                Some(session) => Reply::Page(render_page(&self.files, session)),
                None => Reply::NotFound,
            },
            (Method::Post, "/more") => {
                if let Some(session) = self.sessions.get_mut(session_id) {
                    session.show_more(total);
                }
                Reply::Redirect
            }
            (Method::Post, "/toggle") => {
                let file = query_param(query, "file")
                    .and_then(|v| v.parse::<usize>().ok())
                    .and_then(|i| self.files.get(i));
                if let (Some(file), Some(session)) = (file, self.sessions.get_mut(session_id)) {
                    session.toggle(file);
                }
                Reply::Redirect
            }
            (Method::Post, "/generate") => {
                if let Some(mut session) = self.sessions.remove(session_id) {
                    self.generate(&mut session);
                    self.sessions.insert(session_id.to_string(), session);
                }
                Reply::Redirect
            }
            _ => Reply::NotFound,
        }
    }

    /// 選択した3曲から生成し、結果とログをセッションに残す
    fn generate(&self, session: &mut Session) {
        session.clear_log();
        match self.try_generate(session) {
            Ok(bytes) => {
                session.record("生成が完了しました。");
                session.set_output(bytes);
            }
            Err(e) => {
                warn!("生成に失敗: {}", e);
                session.record(format!("エラー: {}", e));
            }
        }
    }

    fn try_generate(&self, session: &mut Session) -> Result<Vec<u8>> {
        let selected = session.selection_for_generation()?;
        session.record("音楽を生成しています...");

        let notes = load_notes(&selected);
        if notes.is_empty() {
            return Err(CorpusError::Empty {
                files: selected.len(),
            }
            .into());
        }
        session.record(format!("{}個の音符を読み込みました。", notes.len()));

        let music = run_generation(&self.backend, &self.load_dir, &notes, &self.settings)?;
        session.record(format!("{}個のトークンを生成しました。", music.tokens.len()));

        write_midi(&music.events, &self.output)?;
        session.record(format!("MIDIファイルを保存しました: {}", self.output.display()));

        midi_bytes(&music.events)
    }

    fn respond(&mut self, mut request: Request) -> std::io::Result<()> {
        // ボディは使わないが読み切っておく
        let mut body = Vec::new();
        if let Err(e) = request.as_reader().read_to_end(&mut body) {
            warn!("リクエストボディを読めません: {}", e);
        }

        let cookie = request
            .headers()
            .iter()
            .find(|h| h.field.equiv("Cookie"))
            .and_then(|h| session_from_cookie(h.value.as_str()));
        let (session_id, created) = self.open_session(cookie.as_deref());

        let method = request.method().clone();
        let url = request.url().to_string();
        info!("{} {}", method, url);

        let reply = self.route(&method, &url, &session_id);
        let cookie_value = format!("{}={}; Path=/; HttpOnly", SESSION_COOKIE, session_id);

        match reply {
            Reply::Page(html) => {
                let mut response = with_header(
                    Response::from_string(html),
                    "Content-Type",
                    "text/html; charset=utf-8",
                );
                if created {
                    response = with_header(response, "Set-Cookie", &cookie_value);
                }
                request.respond(response)
            }
            Reply::Redirect => {
                let mut response = with_header(Response::empty(StatusCode(303)), "Location", "/");
                if created {
                    response = with_header(response, "Set-Cookie", &cookie_value);
                }
                request.respond(response)
            }
            Reply::NotFound => {
                request.respond(Response::from_string("not found").with_status_code(StatusCode(404)))
            }
        }
    }
}

/// HTTPサーバーを起動してリクエストを順に処理する
pub fn serve(addr: &str, mut app: WebApp) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let server = Server::http(addr).map_err(|e| e.to_string())?;
    println!("http://{} で待ち受けています", addr);

    for request in server.incoming_requests() {
        if let Err(e) = app.respond(request) {
            error!("応答に失敗: {}", e);
        }
    }
    Ok(())
}

fn with_header<R: Read>(response: Response<R>, name: &str, value: &str) -> Response<R> {
    match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

fn session_from_cookie(cookie: &str) -> Option<String> {
    cookie
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

fn query_param<'a>(query: &'a str, name: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// セッションの状態からページを組み立てる
pub fn render_page(files: &[PathBuf], session: &Session) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Music Generator</title></head><body>\n\
         <h1>Music Generator</h1>\n",
    );

    html.push_str(&format!(
        "<p>生成に使うMIDIファイルを{}つ選んでください。</p>\n<ul>\n",
        REQUIRED_SELECTIONS
    ));
    let start = session.start_index();
    for (offset, file) in session.page(files).iter().enumerate() {
        let mark = if session.is_selected(file) { "[x]" } else { "[ ]" };
        html.push_str(&format!(
            "<li><form method=\"post\" action=\"/toggle?file={}\" style=\"display:inline\">\
             <button type=\"submit\">{}</button> {}</form></li>\n",
            start + offset,
            mark,
            escape_html(&file.display().to_string())
        ));
    }
    html.push_str("</ul>\n");

    if start + session.page(files).len() < files.len() {
        html.push_str(
            "<form method=\"post\" action=\"/more\"><button type=\"submit\">ファイルをもっと表示</button></form>\n",
        );
    }

    let selected = session.selected().len();
    if selected != REQUIRED_SELECTIONS {
        html.push_str(&format!(
            "<p>ちょうど{}つ選択してください（現在{}つ）。</p>\n",
            REQUIRED_SELECTIONS, selected
        ));
    }
    html.push_str(
        "<form method=\"post\" action=\"/generate\"><button type=\"submit\">音楽を生成</button></form>\n",
    );

    if !session.log().is_empty() {
        html.push_str("<h2>ステータス</h2>\n<pre>");
        for line in session.log() {
            html.push_str(&escape_html(line));
            html.push('\n');
        }
        html.push_str("</pre>\n");
    }

    if let Some(midi) = session.last_output() {
        let encoded = STANDARD.encode(midi);
        html.push_str(&format!(
            "<audio controls src=\"data:audio/midi;base64,{0}\"></audio>\n\
             <p><a href=\"data:audio/midi;base64,{0}\" download=\"{1}\">MIDIファイルをダウンロード</a></p>\n",
            encoded, OUTPUT_FILE
        ));
    }

    html.push_str("</body></html>\n");
    html
}
