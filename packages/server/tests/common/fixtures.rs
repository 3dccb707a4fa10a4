//! Test fixtures for creating test data.
//!
//! These fixtures go through the identity store and approvals queue so the
//! registry and audit log look exactly as they would in use.

#![allow(dead_code)]

use backoffice_core::domains::approvals::{ServiceApplication, ServiceKind, ServiceRequest};
use backoffice_core::domains::auth::{Principal, Profile};

use super::TestHarness;

pub fn test_profile(username: &str, phone: &str) -> Profile {
    Profile::builder()
        .first_name("Test")
        .last_name(username.to_string())
        .username(username.to_string())
        .phone_number(phone.to_string())
        .build()
}

/// Create a neutral user as whoever is currently logged in.
pub async fn create_test_user(ctx: &TestHarness, username: &str, phone: &str) -> Principal {
    ctx.identity()
        .create_user(test_profile(username, phone))
        .await
        .expect("create user")
}

/// Sign up a neutral user, accept the terms and submit a service request.
///
/// Leaves the new user logged in.
pub async fn submit_test_request(
    ctx: &TestHarness,
    username: &str,
    phone: &str,
    kind: ServiceKind,
) -> (Principal, ServiceRequest) {
    let user = ctx
        .identity()
        .signup(test_profile(username, phone))
        .await
        .expect("signup");
    ctx.identity().accept_terms().await.expect("accept terms");

    let request = ctx
        .kernel
        .approvals
        .submit(
            ServiceApplication::builder()
                .kind(kind)
                .business_name(format!("{} Trading", username))
                .business_type("Retail")
                .build(),
        )
        .await
        .expect("submit service request");
    (user, request)
}
