use askama::Template;
use axum::{
    extract::{rejection::FormRejection, State},
    http::{header::SET_COOKIE, HeaderMap},
    response::{IntoResponse, Response},
    Form,
};
use tracing::{info, warn};
use validator::Validate;

use crate::app_state::AppState;
use crate::db::models::NewAttendee;
use crate::error::{AppError, AppResult};
use crate::flash::{redirect_with_flash, take_flash, Flash};
use crate::modules::HtmlTemplate;

const LEDGER_FAILED_MESSAGE: &str = "Your registration was saved, but we could not update the event sheet. It will be synced automatically.";

#[derive(Template)]
#[template(path = "registration/form.html")]
struct RegistrationFormTemplate<'a> {
    event_name: &'a str,
    flash: Option<Flash>,
}

#[derive(Template)]
#[template(path = "registration/thanks.html")]
struct ThanksTemplate<'a> {
    event_name: &'a str,
    name: &'a str,
    register_number: &'a str,
    email: &'a str,
    warning: Option<&'a str>,
}

pub async fn registration_form(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (flash, clear_cookie) = take_flash(&state.cookie_key, &headers);

    let mut response = HtmlTemplate(RegistrationFormTemplate {
        event_name: &state.env.app.name,
        flash,
    })
    .into_response();

    if let Some(clear_cookie) = clear_cookie {
        response.headers_mut().append(SET_COOKIE, clear_cookie);
    }
    response
}

pub async fn register(
    State(state): State<AppState>,
    form: Result<Form<NewAttendee>, FormRejection>,
) -> AppResult<Response> {
    let incomplete = || {
        let err = AppError::BadRequest("incomplete registration form".to_string());
        redirect_with_flash(&state.cookie_key, "/", &Flash::error(err.user_message()))
    };

    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            warn!(error = %rejection, "Rejected registration form");
            return Ok(incomplete());
        }
    };
    if let Err(errors) = form.validate() {
        warn!(error = %errors, "Registration form has empty fields");
        return Ok(incomplete());
    }

    let receipt = match state.registrations.register(form.into()).await {
        Ok(receipt) => receipt,
        Err(err @ AppError::DuplicateRegistration(_)) => {
            info!("{}", err);
            return Ok(redirect_with_flash(
                &state.cookie_key,
                "/",
                &Flash::error(err.user_message()),
            ));
        }
        Err(err) => return Err(err),
    };

    let mail_warning = receipt
        .notification_error
        .map(|err| AppError::NotificationFailed(err).user_message());

    if receipt.ledger_error.is_some() {
        let message = match mail_warning {
            Some(warning) => format!("{} {}", LEDGER_FAILED_MESSAGE, warning),
            None => LEDGER_FAILED_MESSAGE.to_string(),
        };
        return Ok(redirect_with_flash(
            &state.cookie_key,
            "/",
            &Flash::warning(message),
        ));
    }

    let attendee = &receipt.registration.attendee;
    Ok(HtmlTemplate(ThanksTemplate {
        event_name: &state.env.app.name,
        name: &attendee.name,
        register_number: &attendee.register_number,
        email: &attendee.email,
        warning: mail_warning,
    })
    .into_response())
}
