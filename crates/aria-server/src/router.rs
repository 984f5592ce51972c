//! Request dispatch: one wire line in, one wire line out.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, warn};

use aria_auth::hash::login_challenge;
use aria_auth::{NonceRegistry, SubscriptionTier, UserRecord, UserStore};
use aria_proto::{action, ProtoError, Request, Response};

/// Stateless-per-request dispatcher shared by every connection task.
///
/// All account state lives behind the [`UserStore`]; the only state owned
/// here is the registry of pending login nonces.
pub struct Router<S> {
    store: Arc<S>,
    nonces: NonceRegistry,
}

impl<S: UserStore> Router<S> {
    pub fn new(store: Arc<S>) -> Self {
        Router {
            store,
            nonces: NonceRegistry::new(),
        }
    }

    /// Answer one request line. Any failure to parse the envelope or its
    /// payload collapses into the generic server-error envelope; the
    /// caller keeps the connection open either way.
    pub async fn dispatch(&self, line: &str) -> String {
        debug!(request = line, "received request");
        let response = match self.route(line).await {
            Ok(response) => response,
            Err(err) => Response::server_error(&err),
        };
        let out = response.to_line();
        debug!(response = %out, "sending response");
        out
    }

    async fn route(&self, line: &str) -> Result<Response, ProtoError> {
        let request = Request::parse(line)?;
        Ok(match request.action.as_str() {
            action::GET_NONCE => self.get_nonce(request.payload()?).await,
            action::SIGNUP => self.signup(request.payload()?).await,
            action::LOGIN => self.login(request.payload()?).await,
            action::GET_SALT => self.get_salt(request.payload()?).await,
            action::DELETE_ACCOUNT => self.delete_account(request.payload()?).await,
            action::UPDATE_PREMIUM => self.update_premium(request.payload()?).await,
            action::GET_USER_STATUS => self.get_user_status(request.payload()?).await,
            action::ADD_CREDIT => self.add_credit(request.payload()?).await,
            action::CHANGE_PASSWORD => self.change_password(request.payload()?).await,
            action::EDIT_USERNAME => self.edit_username(request.payload()?).await,
            other => {
                warn!(action = other, "unknown action");
                Response::literal_error("error", "Unknown action")
            }
        })
    }

    async fn get_nonce(&self, data: aria_proto::EmailData) -> Response {
        match self.store.lookup(&data.email).await {
            Some(_) => {
                let nonce = self.nonces.issue(&data.email);
                Response::success(action::GET_NONCE).field("nonce", nonce)
            }
            None => Response::error(action::GET_NONCE, "User not found"),
        }
    }

    async fn signup(&self, data: aria_proto::SignupData) -> Response {
        let record = UserRecord::new(
            &data.username,
            &data.email,
            &data.password_hash,
            &data.password_salt,
        );
        let summary = json!({
            "id": record.id,
            "username": record.username,
            "email": record.email,
        });
        // insert re-checks uniqueness under the store lock
        if self.store.insert(record).await {
            Response::success(action::SIGNUP)
                .message("Registration successful")
                .field("data", summary)
        } else {
            Response::error(action::SIGNUP, "Email already exists")
        }
    }

    async fn login(&self, data: aria_proto::LoginData) -> Response {
        let user = self.store.lookup(&data.email).await;
        let nonce = self.nonces.peek(&data.email);
        let (Some(user), Some(nonce)) = (user, nonce) else {
            return Response::error(action::LOGIN, "Invalid email, password, or nonce missing");
        };

        let expected = login_challenge(&user.password_hash, &nonce);
        if expected != data.password_hash {
            return Response::error(action::LOGIN, "Invalid email or password");
        }

        // The nonce is single-use but only a successful proof burns it.
        self.nonces.consume(&data.email);
        Response::success(action::LOGIN)
            .message("Login successful")
            .field("data", login_data(&user))
    }

    async fn get_salt(&self, data: aria_proto::EmailData) -> Response {
        match self.store.lookup(&data.email).await {
            Some(user) => Response::success(action::GET_SALT).field("salt", user.password_salt),
            None => Response::error(action::GET_SALT, "User not found"),
        }
    }

    async fn delete_account(&self, data: aria_proto::DeleteAccountData) -> Response {
        let Some(user) = self.store.lookup(&data.email).await else {
            return Response::error(action::DELETE_ACCOUNT, "User not found");
        };
        // Deletion proves the raw stored hash, not a nonce challenge.
        if user.password_hash != data.password_hash {
            return Response::error(action::DELETE_ACCOUNT, "Invalid password");
        }
        if self.store.remove(&data.email).await {
            Response::success(action::DELETE_ACCOUNT).message("Account deleted successfully")
        } else {
            Response::error(action::DELETE_ACCOUNT, "Failed to delete account")
        }
    }

    async fn update_premium(&self, data: aria_proto::UpdatePremiumData) -> Response {
        let tier = data.subscription_type.parse::<SubscriptionTier>();
        let updated = self
            .store
            .update(&data.email, |user| match tier {
                Ok(tier) => {
                    user.set_subscription(tier, Utc::now());
                    true
                }
                Err(_) => false,
            })
            .await;
        match updated {
            None => Response::error(action::UPDATE_PREMIUM, "User not found"),
            Some(false) => Response::error(action::UPDATE_PREMIUM, "Invalid subscription type"),
            Some(true) => Response::success(action::UPDATE_PREMIUM)
                .message("Subscription updated successfully"),
        }
    }

    async fn get_user_status(&self, data: aria_proto::EmailData) -> Response {
        match self.store.lookup(&data.email).await {
            Some(user) => Response::success(action::GET_USER_STATUS).field("data", status_data(&user)),
            None => Response::error(action::GET_USER_STATUS, "User not found"),
        }
    }

    async fn add_credit(&self, data: aria_proto::AddCreditData) -> Response {
        let updated = self
            .store
            .update(&data.email, |user| {
                if user.add_credit(data.amount) {
                    Some(user.credit)
                } else {
                    None
                }
            })
            .await;
        match updated {
            None => Response::error(action::ADD_CREDIT, "User not found"),
            Some(None) => Response::error(action::ADD_CREDIT, "Invalid amount"),
            Some(Some(credit)) => Response::success(action::ADD_CREDIT)
                .message("Credit added successfully")
                .field("credit", credit),
        }
    }

    async fn change_password(&self, data: aria_proto::ChangePasswordData) -> Response {
        let updated = self
            .store
            .update(&data.email, |user| {
                // The old-hash check must see the same record state the
                // mutation applies to.
                if user.password_hash != data.password_hash {
                    return false;
                }
                user.set_credentials(&data.new_password_hash, &data.new_password_salt);
                true
            })
            .await;
        match updated {
            None => Response::error(action::CHANGE_PASSWORD, "User not found"),
            Some(false) => Response::error(action::CHANGE_PASSWORD, "Invalid password"),
            Some(true) => {
                Response::success(action::CHANGE_PASSWORD).message("Password changed successfully")
            }
        }
    }

    async fn edit_username(&self, data: aria_proto::EditUsernameData) -> Response {
        let updated = self
            .store
            .update(&data.email, |user| user.edit_username(&data.username))
            .await;
        match updated {
            None => Response::error(action::EDIT_USERNAME, "User not found"),
            Some(false) => Response::error(action::EDIT_USERNAME, "Invalid username"),
            Some(true) => {
                Response::success(action::EDIT_USERNAME).message("Username updated successfully")
            }
        }
    }
}

/// Profile block returned on a successful login.
fn login_data(user: &UserRecord) -> Value {
    json!({
        "id": user.id,
        "username": user.username,
        "email": user.email,
        "credit": user.credit,
        "subscription": user.subscription.as_str(),
        "subscriptionExpireAt": user.subscription_expire_at,
    })
}

/// Profile block returned by `get_user_status`; includes the creation
/// timestamp on top of the login block.
fn status_data(user: &UserRecord) -> Value {
    json!({
        "id": user.id,
        "username": user.username,
        "email": user.email,
        "credit": user.credit,
        "subscription": user.subscription.as_str(),
        "createdAt": user.created_at,
        "subscriptionExpireAt": user.subscription_expire_at,
    })
}
