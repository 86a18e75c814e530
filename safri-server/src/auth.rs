use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, State},
    http::{header, request::Parts, StatusCode},
    routing::{get, post},
    Json,
};

use safri_dispatch::{Credentials, Role, SessionData};

use crate::{
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{
        ChangePasswordSchema, DriverLoginSchema, LoginSchema, PresenceSchema, RegisterSchema,
        ValidatedJson,
    },
    serialized::{DriverLoginResult, LoginResult, ToSerialized, User},
    Router,
};

/// Wraps [SessionData] so [FromRequestParts] can be implemented for it
pub struct Session(pub SessionData);

impl Session {
    /// Ensures the session belongs to the expected actor type.
    pub fn require(self, role: Role) -> ServerResult<SessionData> {
        if self.0.role == role {
            Ok(self.0)
        } else {
            Err(ServerError::Unauthorized)
        }
    }

    /// Riders and freight riders both request rides.
    pub fn require_customer(self) -> ServerResult<SessionData> {
        match self.0.role {
            Role::Rider | Role::FreightRider => Ok(self.0),
            _ => Err(ServerError::Unauthorized),
        }
    }
}

#[async_trait]
impl FromRequestParts<ServerContext> for Session {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        let context = ServerContext::from_ref(state);

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|x| x.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "Missing authorization"))?;

        let parts: Vec<_> = token.split_ascii_whitespace().collect();

        if parts.first() != Some(&"Bearer") {
            return Err((StatusCode::BAD_REQUEST, "Authorization must be Bearer"));
        }

        let token = parts.last().cloned().unwrap_or_default();

        let session = context
            .dispatch
            .auth
            .session(token)
            .await
            .map_err(|_| (StatusCode::UNAUTHORIZED, "Session does not exist"))?;

        Ok(Self(session))
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    tag = "auth",
    request_body = RegisterSchema,
    responses(
        (status = 200, body = LoginResult)
    )
)]
async fn register(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<RegisterSchema>,
) -> ServerResult<Json<LoginResult>> {
    let role: Role = body.role.into();
    let password = body.password.clone();

    let account = context
        .dispatch
        .auth
        .register(safri_dispatch::NewAccount {
            user_name: body.user_name,
            email: body.email,
            phone_number: body.phone_number,
            password: body.password,
            role,
        })
        .await?;

    let session = context
        .dispatch
        .auth
        .login(Credentials {
            email: account.email.clone(),
            password,
            role,
        })
        .await?;

    Ok(Json((session, account).to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    tag = "auth",
    request_body = LoginSchema,
    responses(
        (status = 200, body = LoginResult)
    )
)]
async fn login(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<LoginSchema>,
) -> ServerResult<Json<LoginResult>> {
    let role: Role = body.role.into();

    let session = context
        .dispatch
        .auth
        .login(Credentials {
            email: body.email,
            password: body.password,
            role,
        })
        .await?;

    let account = context.dispatch.auth.account(role, &session.uid).await?;

    Ok(Json((session, account).to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/auth/driver-login",
    tag = "auth",
    request_body = DriverLoginSchema,
    responses(
        (status = 200, body = DriverLoginResult)
    )
)]
async fn driver_login(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<DriverLoginSchema>,
) -> ServerResult<Json<DriverLoginResult>> {
    let (session, driver) = context.dispatch.auth.driver_login(&body.pin).await?;

    Ok(Json((session, driver).to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/auth/user",
    tag = "auth",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User)
    )
)]
async fn user(session: Session, State(context): State<ServerContext>) -> ServerResult<Json<User>> {
    let session = session.0;

    if session.role == Role::Driver {
        return Err(ServerError::BadRequest(
            "Driver sessions have no account profile".to_string(),
        ));
    }

    let account = context
        .dispatch
        .auth
        .account(session.role, &session.uid)
        .await?;

    Ok(Json(account.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    tag = "auth",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Session was deleted")
    )
)]
async fn logout(session: Session, State(context): State<ServerContext>) -> ServerResult<()> {
    context.dispatch.auth.logout(&session.0.token).await?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/auth/password",
    tag = "auth",
    request_body = ChangePasswordSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Password was changed")
    )
)]
async fn change_password(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<ChangePasswordSchema>,
) -> ServerResult<()> {
    let session = session.0;

    context
        .dispatch
        .auth
        .change_password(
            session.role,
            &session.uid,
            &body.current_password,
            &body.new_password,
        )
        .await?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/auth/presence",
    tag = "auth",
    request_body = PresenceSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Presence flag was written")
    )
)]
async fn presence(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<PresenceSchema>,
) -> ServerResult<()> {
    let session = session.0;

    if session.role == Role::Driver {
        return Err(ServerError::BadRequest(
            "Use the driver presence endpoint".to_string(),
        ));
    }

    context
        .dispatch
        .presence
        .set_account_online(session.role, &session.uid, body.online)
        .await?;

    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/driver-login", post(driver_login))
        .route("/user", get(user))
        .route("/logout", post(logout))
        .route("/password", post(change_password))
        .route("/presence", post(presence))
}
