//! Where to send a browser once an emailed link or OAuth redirect lands.

use std::fmt;

/// Query parameters the auth provider appends to the redirect.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub error: Option<String>,
    pub error_code: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// `type=recovery` is the only signal the provider guarantees.
    pub fn is_recovery(&self) -> bool {
        self.kind.as_deref() == Some("recovery")
    }

    fn code(&self) -> Option<&str> {
        self.code.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }
}

/// Machine-readable reason shown on the login page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    InvalidCode,
    /// The redirect's query string couldn't be read.
    InvalidRequest,
    NoSession,
    /// Error code passed through from the provider.
    Provider(String),
}

impl LoginError {
    pub fn as_str(&self) -> &str {
        match self {
            LoginError::InvalidCode => "invalid_code",
            LoginError::InvalidRequest => "invalid_request",
            LoginError::NoSession => "no_session",
            LoginError::Provider(code) => code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Home,
    ResetPassword,
    /// The link expired, or an email scanner used it up before the user did.
    ForgotPasswordExpired,
    Login(LoginError),
}

impl Destination {
    pub fn location(&self) -> String {
        match self {
            Destination::Home => "/".to_owned(),
            Destination::ResetPassword => "/reset-password".to_owned(),
            Destination::ForgotPasswordExpired => "/forgot-password?error=expired".to_owned(),
            Destination::Login(reason) => {
                let query = serde_urlencoded::to_string(&[("error", reason.as_str())])
                    .unwrap_or_else(|_| "error=unknown".to_owned());
                format!("/login?{}", query)
            }
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.location())
    }
}

/// First step of the decision, made before anything is exchanged.
#[derive(Debug, PartialEq, Eq)]
pub enum Landing<'a> {
    /// The provider reported an error; no further work.
    Failed(Destination),
    /// A code to exchange for a session.
    Exchange(&'a str),
    /// Nothing to exchange server-side; wait for the session to show up.
    AwaitSession,
}

pub fn classify(params: &CallbackParams) -> Landing<'_> {
    if params.error.is_some() || params.error_code.is_some() {
        return Landing::Failed(classify_error(params));
    }

    match params.code() {
        Some(code) => Landing::Exchange(code),
        None => Landing::AwaitSession,
    }
}

fn classify_error(params: &CallbackParams) -> Destination {
    let error = params.error.as_deref();
    let code = params.error_code.as_deref();

    if error == Some("access_denied") || code == Some("otp_expired") {
        return Destination::ForgotPasswordExpired;
    }

    let raw = code.or(error).unwrap_or("unknown");
    Destination::Login(LoginError::Provider(raw.to_owned()))
}

/// Whether the completed flow was a password recovery, strongest signal first.
pub fn wants_recovery(params: &CallbackParams, referer: Option<&str>) -> bool {
    params.is_recovery() || referer.map_or(false, |r| r.contains("recovery"))
}

/// Destination once a session exists.
pub fn after_sign_in(params: &CallbackParams, referer: Option<&str>) -> Destination {
    if wants_recovery(params, referer) {
        Destination::ResetPassword
    } else {
        Destination::Home
    }
}
