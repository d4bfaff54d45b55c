//! Scripted browser standing in for the provider's login pages.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use lidl_auth::login::selectors;
use lidl_auth::{AuthError, BrowserDriver, BrowserLauncher, CapturedRequest, Result};

/// Effect of clicking an element.
#[derive(Debug, Clone)]
pub enum Action {
    Show(String),
    Hide(String),
    Text(String, String),
    Request(CapturedRequest),
    Body(String, String),
}

impl Action {
    pub fn show(selector: &str) -> Self {
        Action::Show(selector.to_string())
    }

    pub fn text(selector: &str, text: &str) -> Self {
        Action::Text(selector.to_string(), text.to_string())
    }

    pub fn redirect(id: &str, url: &str, location: &str) -> Self {
        Action::Request(
            CapturedRequest::new("GET", url)
                .with_id(id)
                .with_response(302, Some(location)),
        )
    }

    pub fn ok(id: &str, url: &str) -> Self {
        Action::Request(CapturedRequest::new("POST", url).with_id(id).with_response(200, None))
    }

    pub fn body(id: &str, body: &str) -> Self {
        Action::Body(id.to_string(), body.to_string())
    }
}

/// Everything the fake pages know and everything the login did to them.
#[derive(Debug, Default)]
pub struct PageState {
    pub visible: HashSet<String>,
    pub texts: HashMap<String, Vec<String>>,
    /// Per selector, one action list per click. The last list repeats.
    pub on_click: HashMap<String, VecDeque<Vec<Action>>>,
    pub requests: Vec<CapturedRequest>,
    pub bodies: HashMap<String, String>,
    pub body_reads: usize,
    pub navigated: Vec<String>,
    pub clicks: Vec<String>,
    pub typed: Vec<(String, String)>,
    pub launches: usize,
    pub closed: usize,
}

impl PageState {
    fn apply(&mut self, action: Action) {
        match action {
            Action::Show(selector) => {
                self.visible.insert(selector);
            }
            Action::Hide(selector) => {
                self.visible.remove(&selector);
            }
            Action::Text(selector, text) => {
                self.visible.insert(selector.clone());
                self.texts.entry(selector).or_default().push(text);
            }
            Action::Request(request) => self.requests.push(request),
            Action::Body(id, body) => {
                self.bodies.insert(id, body);
            }
        }
    }
}

/// Builder for a scripted login UI rooted at `auth`.
#[derive(Clone)]
pub struct FakePages {
    pub auth: String,
    pub state: Arc<Mutex<PageState>>,
}

impl FakePages {
    pub fn new(auth: &str) -> Self {
        let pages = Self {
            auth: auth.trim_end_matches('/').to_string(),
            state: Arc::new(Mutex::new(PageState::default())),
        };
        pages.state.lock().visible.insert(selectors::WELCOME_LOGIN.to_string());
        pages
    }

    /// Welcome, identifier and password pages that accept anything.
    pub fn with_credential_pages(self) -> Self {
        let phone_exists = format!("{}/api/phone/exists", self.auth);
        self.on_click(
            selectors::WELCOME_LOGIN,
            vec![vec![Action::show(selectors::EMAIL_OR_PHONE)]],
        )
        .on_click(
            selectors::SUBMIT_EMAIL,
            vec![
                vec![],
                vec![
                    Action::ok("phone", &phone_exists),
                    Action::show(selectors::PASSWORD),
                ],
            ],
        )
    }

    /// Password submit answered by a body-less redirect to `location`, then `after`.
    pub fn password_submit(self, location: &str, mut after: Vec<Action>) -> Self {
        let login_url = format!("{}/Account/Login", self.auth);
        let mut actions = vec![Action::redirect("login", &login_url, location)];
        actions.append(&mut after);
        self.on_click(selectors::SUBMIT_PASSWORD, vec![actions])
    }

    /// Password submit answered by the login page rendered again with `body`.
    pub fn password_rejected(self, body: &str) -> Self {
        let login_url = format!("{}/Account/Login", self.auth);
        self.on_click(
            selectors::SUBMIT_PASSWORD,
            vec![vec![Action::ok("login", &login_url), Action::body("login", body)]],
        )
    }

    /// Password accepted; the provider redirects straight to the app callback.
    pub fn password_accepted(self, callback_location: &str) -> Self {
        let callback = self.callback_redirect("cb", callback_location);
        self.password_submit(
            "/connect/authorize/callback?client_id=LidlPlusNativeClient",
            vec![callback],
        )
    }

    pub fn callback_redirect(&self, id: &str, location: &str) -> Action {
        Action::redirect(
            id,
            &format!("{}/connect/authorize/callback?client_id=LidlPlusNativeClient", self.auth),
            location,
        )
    }

    pub fn on_click(self, selector: &str, scripts: Vec<Vec<Action>>) -> Self {
        self.state
            .lock()
            .on_click
            .insert(selector.to_string(), scripts.into());
        self
    }

    pub fn launcher(&self) -> FakeLauncher {
        FakeLauncher {
            state: self.state.clone(),
        }
    }

    pub fn launches(&self) -> usize {
        self.state.lock().launches
    }

    pub fn body_reads(&self) -> usize {
        self.state.lock().body_reads
    }

    pub fn closed(&self) -> usize {
        self.state.lock().closed
    }

    pub fn clicks(&self, selector: &str) -> usize {
        self.state
            .lock()
            .clicks
            .iter()
            .filter(|clicked| clicked.as_str() == selector)
            .count()
    }

    pub fn typed(&self, selector: &str) -> Vec<String> {
        self.state
            .lock()
            .typed
            .iter()
            .filter(|(target, _)| target == selector)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

pub struct FakeLauncher {
    state: Arc<Mutex<PageState>>,
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self, _headless: bool) -> Result<Box<dyn BrowserDriver>> {
        self.state.lock().launches += 1;
        Ok(Box::new(FakeBrowser {
            state: self.state.clone(),
        }))
    }
}

pub struct FakeBrowser {
    state: Arc<Mutex<PageState>>,
}

#[async_trait]
impl BrowserDriver for FakeBrowser {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.state.lock().navigated.push(url.to_string());
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.clicks.push(selector.to_string());
        let actions = match state.on_click.get_mut(selector) {
            Some(scripts) if scripts.len() > 1 => scripts.pop_front().unwrap_or_default(),
            Some(scripts) => scripts.front().cloned().unwrap_or_default(),
            None => Vec::new(),
        };
        for action in actions {
            state.apply(action);
        }
        Ok(())
    }

    async fn type_text(&mut self, selector: &str, text: &str) -> Result<()> {
        let mut state = self.state.lock();
        if !state.visible.contains(selector) {
            return Err(AuthError::Browser(format!("No element matches '{}'", selector)));
        }
        state.typed.push((selector.to_string(), text.to_string()));
        Ok(())
    }

    async fn is_visible(&mut self, selector: &str) -> Result<bool> {
        Ok(self.state.lock().visible.contains(selector))
    }

    async fn is_clickable(&mut self, selector: &str) -> Result<bool> {
        Ok(self.state.lock().visible.contains(selector))
    }

    async fn element_texts(&mut self, selector: &str) -> Result<Vec<String>> {
        Ok(self
            .state
            .lock()
            .texts
            .get(selector)
            .cloned()
            .unwrap_or_default())
    }

    async fn captured_requests(&mut self) -> Result<Vec<CapturedRequest>> {
        Ok(self.state.lock().requests.clone())
    }

    async fn clear_captured_requests(&mut self) -> Result<()> {
        self.state.lock().requests.clear();
        Ok(())
    }

    async fn response_body(&mut self, request: &CapturedRequest) -> Result<String> {
        let mut state = self.state.lock();
        state.body_reads += 1;
        request
            .id
            .as_ref()
            .and_then(|id| state.bodies.get(id))
            .cloned()
            .ok_or_else(|| AuthError::Browser(format!("No body for {}", request.url)))
    }

    async fn close(&mut self) -> Result<()> {
        self.state.lock().closed += 1;
        Ok(())
    }
}
