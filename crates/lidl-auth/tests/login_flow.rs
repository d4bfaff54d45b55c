//! Login flow against scripted login pages and a mock token endpoint.

mod support;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use wiremock::matchers::{any, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lidl_auth::login::{MAX_LEGAL_TERMS_SCREENS, selectors};
use lidl_auth::{
    AuthError, Authenticator, CancellationToken, Credentials, LoginOptions, LoginSequencer, ProviderConfig,
    TwoFactorMethod, UnavailableLauncher, VerificationPrompt,
};
use support::{Action, FakePages};

const AUTH: &str = "https://accounts.lidl.com";
const CODE_LOCATION: &str = "com.lidlplus.app://callback?code=ABCDEF&scope=openid&state=x";
const LEGAL_TERMS_LOCATION: &str = "https://accounts.lidl.com/legalTerms?returnUrl=%2Fconnect";

fn no_prompt() -> impl VerificationPrompt {
    |_: TwoFactorMethod| String::new()
}

fn credentials() -> Credentials {
    Credentials::new("+4915112345678", "hunter2")
}

fn quick_options() -> LoginOptions {
    LoginOptions {
        timeout: Duration::from_millis(300),
        ..LoginOptions::default()
    }
}

async fn run_sequencer(pages: &FakePages, options: &LoginOptions) -> lidl_auth::Result<String> {
    let provider = ProviderConfig::lidl_plus();
    let method = options.two_factor.parse().unwrap();
    LoginSequencer::new(&provider, options, method)
        .run(
            &pages.launcher(),
            "https://accounts.lidl.com/connect/authorize?client_id=LidlPlusNativeClient",
            &credentials(),
            &no_prompt(),
        )
        .await
}

async fn provider_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "issuer": server.uri(),
            "authorization_endpoint": format!("{}/connect/authorize", server.uri()),
        })))
        .mount(&server)
        .await;
    server
}

async fn mount_token_endpoint(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/connect/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=ABCDEF"))
        .and(body_string_contains("code_verifier="))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "A1",
            "refresh_token": "R1",
            "expires_in": 3600,
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn authenticator(server: &MockServer) -> Authenticator {
    Authenticator::builder("DE", "de")
        .provider(ProviderConfig::with_base_url(&server.uri()))
        .build()
        .unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Full login
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_login_exchanges_code_for_tokens() {
    let server = provider_server().await;
    mount_token_endpoint(&server, 1).await;
    let pages = FakePages::new(&server.uri())
        .with_credential_pages()
        .password_accepted(CODE_LOCATION);

    let mut auth = authenticator(&server);
    auth.login(
        &pages.launcher(),
        &credentials(),
        &LoginOptions::default(),
        &no_prompt(),
    )
    .await
    .unwrap();

    assert_eq!(auth.session().access_token(), "A1");
    assert_eq!(auth.refresh_token(), "R1");
    assert!(auth.session().expires_at().is_some());
    assert!(!auth.session().has_pending_login());

    assert_eq!(pages.launches(), 1);
    assert_eq!(pages.closed(), 1);
    assert_eq!(pages.typed(selectors::EMAIL_OR_PHONE), vec!["+4915112345678"]);
    assert_eq!(pages.typed(selectors::PASSWORD), vec!["hunter2"]);
    assert_eq!(pages.clicks(selectors::SUBMIT_EMAIL), 2);

    let navigated = pages.state.lock().navigated.clone();
    assert_eq!(navigated.len(), 1);
    assert!(navigated[0].starts_with(&format!("{}/connect/authorize?", server.uri())));
    assert!(navigated[0].contains("code_challenge="));

    // Fresh token: no further exchange needed
    let headers = auth.authorized_headers().await.unwrap();
    assert_eq!(headers["authorization"], "Bearer A1");
}

#[tokio::test]
async fn test_wrong_credentials_inline() {
    let server = provider_server().await;
    mount_token_endpoint(&server, 0).await;
    let pages = FakePages::new(&server.uri())
        .with_credential_pages()
        .on_click(
            selectors::SUBMIT_PASSWORD,
            vec![vec![Action::text(selectors::INPUT_ERROR, "Wrong credentials")]],
        );

    let mut auth = authenticator(&server);
    let result = auth
        .login(&pages.launcher(), &credentials(), &quick_options(), &no_prompt())
        .await;

    match result {
        Err(AuthError::LoginRejected(message)) => assert_eq!(message, "Wrong credentials"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(pages.closed(), 1);
    assert!(!auth.session().has_credentials());
}

#[tokio::test]
async fn test_invalid_two_factor_method() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    let pages = FakePages::new(&server.uri()).with_credential_pages();

    let options = LoginOptions {
        two_factor: "sms".to_string(),
        ..LoginOptions::default()
    };
    let mut auth = authenticator(&server);
    let result = auth
        .login(&pages.launcher(), &credentials(), &options, &no_prompt())
        .await;

    assert!(matches!(result, Err(AuthError::InvalidArgument(_))));
    assert_eq!(pages.launches(), 0);
}

#[tokio::test]
async fn test_missing_code_skips_exchange() {
    let server = provider_server().await;
    mount_token_endpoint(&server, 0).await;
    let pages = FakePages::new(&server.uri())
        .with_credential_pages()
        .password_accepted("com.lidlplus.app://callback?error=access_denied");

    let mut auth = authenticator(&server);
    let result = auth
        .login(&pages.launcher(), &credentials(), &quick_options(), &no_prompt())
        .await;

    assert!(matches!(result, Err(AuthError::MissingAuthorizationCode)));
    assert_eq!(pages.closed(), 1);
}

#[tokio::test]
async fn test_browser_unavailable() {
    let server = provider_server().await;
    mount_token_endpoint(&server, 0).await;

    let mut auth = authenticator(&server);
    let result = auth
        .login(
            &UnavailableLauncher,
            &credentials(),
            &LoginOptions::default(),
            &no_prompt(),
        )
        .await;

    assert!(matches!(result, Err(AuthError::BrowserUnavailable(_))));
}

// ─────────────────────────────────────────────────────────────────────────────
// Sequencer branches
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_rejection_in_login_response() {
    let body = r#"<html><div app-errors="{&quot;Password&quot;:&quot;Wrong credentials&quot;}"></div></html>"#;
    let pages = FakePages::new(AUTH)
        .with_credential_pages()
        .password_rejected(body);

    let result = run_sequencer(&pages, &quick_options()).await;

    match result {
        Err(AuthError::LoginRejected(message)) => assert_eq!(message, "Wrong credentials"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(pages.closed(), 1);
}

#[tokio::test]
async fn test_redirect_after_password_is_not_read() {
    let server = provider_server().await;
    mount_token_endpoint(&server, 1).await;
    let pages = FakePages::new(&server.uri())
        .with_credential_pages()
        .password_accepted(CODE_LOCATION);
    assert!(pages.state.lock().bodies.is_empty());

    let mut auth = authenticator(&server);
    auth.login(&pages.launcher(), &credentials(), &quick_options(), &no_prompt())
        .await
        .unwrap();

    assert_eq!(auth.refresh_token(), "R1");
    assert_eq!(pages.body_reads(), 0);
    assert_eq!(pages.closed(), 1);
}

#[tokio::test]
async fn test_unreadable_login_page_continues_to_two_factor() {
    let login_url = format!("{}/Account/Login", AUTH);
    let pages = FakePages::new(AUTH).with_credential_pages();
    let callback = pages.callback_redirect("cb", CODE_LOCATION);
    let pages = pages
        .on_click(
            selectors::SUBMIT_PASSWORD,
            vec![vec![Action::ok("login", &login_url), Action::show(".phone")]],
        )
        .on_click(
            ".phone button",
            vec![vec![Action::show(selectors::VERIFICATION_CODE)]],
        )
        .on_click(selectors::VERIFY_NEXT, vec![vec![callback]]);

    let provider = ProviderConfig::lidl_plus();
    let options = quick_options();
    let code = LoginSequencer::new(&provider, &options, TwoFactorMethod::Phone)
        .run(
            &pages.launcher(),
            "https://accounts.lidl.com/connect/authorize",
            &credentials(),
            &|_: TwoFactorMethod| "654321".to_string(),
        )
        .await
        .unwrap();

    assert_eq!(code, "ABCDEF");
    assert!(pages.body_reads() > 1);
    assert_eq!(pages.typed(selectors::VERIFICATION_CODE), vec!["654321"]);
}

#[tokio::test]
async fn test_rejected_identifier_is_not_a_timeout() {
    // The identifier form shows an error and never calls /api/phone/exists
    let pages = FakePages::new(AUTH)
        .with_credential_pages()
        .on_click(
            selectors::SUBMIT_EMAIL,
            vec![
                vec![],
                vec![Action::text(selectors::INPUT_ERROR, "Unknown phone number")],
            ],
        );

    let result = run_sequencer(&pages, &quick_options()).await;

    match result {
        Err(AuthError::LoginRejected(message)) => assert_eq!(message, "Unknown phone number"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_slow_ui_times_out() {
    let pages = FakePages::new(AUTH).with_credential_pages();
    pages.state.lock().visible.clear();

    let result = run_sequencer(&pages, &quick_options()).await;

    match result {
        Err(AuthError::ElementTimeout { selector }) => {
            assert_eq!(selector, selectors::WELCOME_LOGIN)
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(pages.closed(), 1);
}

#[tokio::test]
async fn test_email_two_factor() {
    let pages = FakePages::new(AUTH).with_credential_pages();
    let callback = pages.callback_redirect("cb", CODE_LOCATION);
    let pages = pages
        .password_submit(
            "/Account/TwoFactorAuthentication?returnUrl=%2Fconnect",
            vec![Action::show(".email")],
        )
        .on_click(
            ".email button",
            vec![vec![Action::show(selectors::VERIFICATION_CODE)]],
        )
        .on_click(selectors::VERIFY_NEXT, vec![vec![callback]]);

    let asked = Arc::new(Mutex::new(Vec::new()));
    let prompt = {
        let asked = asked.clone();
        move |method: TwoFactorMethod| {
            asked.lock().push(method);
            " 123456\n".to_string()
        }
    };

    let options = LoginOptions {
        two_factor: "email".to_string(),
        ..quick_options()
    };
    let provider = ProviderConfig::lidl_plus();
    let code = LoginSequencer::new(&provider, &options, TwoFactorMethod::Email)
        .run(&pages.launcher(), "https://accounts.lidl.com/connect/authorize", &credentials(), &prompt)
        .await
        .unwrap();

    assert_eq!(code, "ABCDEF");
    assert_eq!(*asked.lock(), vec![TwoFactorMethod::Email]);
    assert_eq!(pages.typed(selectors::VERIFICATION_CODE), vec!["123456"]);
    assert_eq!(pages.clicks(".email button"), 1);
    assert_eq!(pages.closed(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Abort
// ─────────────────────────────────────────────────────────────────────────────

/// User who hits Ctrl-C instead of typing the verification code.
struct InterruptedPrompt(CancellationToken);

#[async_trait]
impl VerificationPrompt for InterruptedPrompt {
    async fn verification_code(&self, _method: TwoFactorMethod) -> lidl_auth::Result<String> {
        self.0.cancel();
        std::future::pending().await
    }
}

#[tokio::test]
async fn test_abort_during_two_factor_closes_browser() {
    let server = provider_server().await;
    mount_token_endpoint(&server, 0).await;
    let pages = FakePages::new(&server.uri())
        .with_credential_pages()
        .password_submit(
            "/Account/TwoFactorAuthentication?returnUrl=%2Fconnect",
            vec![Action::show(".phone")],
        );

    let cancellation = CancellationToken::new();
    let options = LoginOptions {
        cancellation: cancellation.clone(),
        ..quick_options()
    };
    let mut auth = authenticator(&server);
    let result = auth
        .login(
            &pages.launcher(),
            &credentials(),
            &options,
            &InterruptedPrompt(cancellation),
        )
        .await;

    assert!(matches!(result, Err(AuthError::Aborted)));
    assert_eq!(pages.launches(), 1);
    assert_eq!(pages.closed(), 1);
    assert!(!auth.session().has_credentials());
}

#[tokio::test]
async fn test_abort_requested_before_run_still_closes() {
    let pages = FakePages::new(AUTH).with_credential_pages();
    let options = quick_options();
    options.cancellation.cancel();

    let result = run_sequencer(&pages, &options).await;

    assert!(matches!(result, Err(AuthError::Aborted)));
    assert_eq!(pages.closed(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Legal terms
// ─────────────────────────────────────────────────────────────────────────────

fn legal_terms_pages() -> FakePages {
    let pages = FakePages::new(AUTH).with_credential_pages();
    let terms = pages.callback_redirect("cb", LEGAL_TERMS_LOCATION);
    pages.password_submit(
        "/connect/authorize/callback?client_id=LidlPlusNativeClient",
        vec![
            terms,
            Action::show(selectors::TERMS_CHECKBOX),
            Action::text(selectors::TERMS_TITLE, "Neue Nutzungsbedingungen"),
        ],
    )
}

#[tokio::test]
async fn test_legal_terms_accepted() {
    let pages = legal_terms_pages();
    let callback = pages.callback_redirect("cb2", CODE_LOCATION);
    let pages = pages.on_click(selectors::TERMS_SUBMIT, vec![vec![callback]]);

    let code = run_sequencer(&pages, &quick_options()).await.unwrap();

    assert_eq!(code, "ABCDEF");
    assert_eq!(pages.clicks(selectors::TERMS_CHECKBOX), 1);
    assert_eq!(pages.clicks(selectors::TERMS_SUBMIT), 1);
    assert_eq!(pages.closed(), 1);
}

#[tokio::test]
async fn test_legal_terms_not_accepted() {
    let pages = legal_terms_pages();
    let options = LoginOptions {
        accept_legal_terms: false,
        ..quick_options()
    };

    let result = run_sequencer(&pages, &options).await;

    match result {
        Err(AuthError::LegalTerms(title)) => assert_eq!(title, "Neue Nutzungsbedingungen"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(pages.clicks(selectors::TERMS_CHECKBOX), 0);
    assert_eq!(pages.closed(), 1);
}

#[tokio::test]
async fn test_legal_terms_loop_is_bounded() {
    let pages = legal_terms_pages();
    let terms_again = pages.callback_redirect("cb", LEGAL_TERMS_LOCATION);
    let pages = pages.on_click(selectors::TERMS_SUBMIT, vec![vec![terms_again]]);

    let result = run_sequencer(&pages, &quick_options()).await;

    match result {
        Err(AuthError::UnexpectedInterstitialLoop { shown }) => {
            assert_eq!(shown, MAX_LEGAL_TERMS_SCREENS + 1)
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(
        pages.clicks(selectors::TERMS_SUBMIT),
        MAX_LEGAL_TERMS_SCREENS as usize
    );
    assert_eq!(pages.closed(), 1);
}
