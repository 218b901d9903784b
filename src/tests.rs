#[cfg(test)]
mod integration_tests {
    use crate::handlers::auth::REFRESH_COOKIE;
    use crate::schemas::{ApiResponse, ErrorResponse};
    use crate::test_utils::test_utils::{
        admin_session, bearer, create_client, email_of, login, setup_test_app,
        setup_test_context, user_session,
    };
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use rust_decimal::Decimal;
    use serde_json::{Value, json};

    fn decimal(value: &Value) -> Decimal {
        value
            .as_str()
            .expect("decimal serialized as string")
            .parse()
            .expect("valid decimal")
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = setup_test_app().await;
        let server = TestServer::new(app).unwrap();

        let response = server.get("/health").await;

        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["database"], "connected");
    }

    #[tokio::test]
    async fn test_prometheus_metrics_endpoint_disabled() {
        let app = setup_test_app().await;
        let server = TestServer::new(app).unwrap();

        // Metrics are off in the test settings
        server.get("/metrics").await.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_register_and_login_sets_refresh_cookie() {
        let ctx = setup_test_context().await;
        let (user_id, _) = user_session(&ctx.server, "alice").await;

        let response = ctx
            .server
            .post("/api/v1/auth/login")
            .json(&json!({ "email": email_of("alice"), "password": "correct-horse" }))
            .await;
        response.assert_status(StatusCode::OK);
        let refresh = response.cookie(REFRESH_COOKIE);
        assert!(!refresh.value().is_empty());
        assert_eq!(refresh.http_only(), Some(true));

        let body: ApiResponse<Value> = response.json();
        let (name, value) = bearer(body.data["access_token"].as_str().unwrap());
        let check = ctx.server.get("/api/v1/auth/check-token").add_header(name, value).await;
        check.assert_status(StatusCode::OK);
        let check: ApiResponse<Value> = check.json();
        assert_eq!(check.message, "token is valid");
        assert_eq!(check.data["user_id"], user_id);
        assert_eq!(check.data["roles"], json!(["user"]));

        let rotated = ctx
            .server
            .post("/api/v1/auth/update-token")
            .add_cookie(refresh)
            .await;
        rotated.assert_status(StatusCode::OK);
        let rotated: ApiResponse<Value> = rotated.json();
        assert!(rotated.data["access_token"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_login_rejections() {
        let ctx = setup_test_context().await;
        user_session(&ctx.server, "bob").await;

        let wrong = ctx
            .server
            .post("/api/v1/auth/login")
            .json(&json!({ "email": email_of("bob"), "password": "nope" }))
            .await;
        wrong.assert_status(StatusCode::UNAUTHORIZED);
        let error: ErrorResponse = wrong.json();
        assert!(!error.success);

        ctx.server
            .post("/api/v1/auth/update-token")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_register_validation_and_duplicates() {
        let ctx = setup_test_context().await;

        ctx.server
            .post("/api/v1/users/register")
            .json(&json!({ "username": "x", "email": "not-an-email", "password": "long-enough" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        user_session(&ctx.server, "carol").await;
        ctx.server
            .post("/api/v1/users/register")
            .json(&json!({ "username": "carol2", "email": email_of("carol"), "password": "long-enough" }))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_role_gate() {
        let ctx = setup_test_context().await;
        let (_, user_token) = user_session(&ctx.server, "plain").await;
        let (_, admin_token) = admin_session(&ctx, "boss").await;

        // No token at all
        ctx.server.get("/api/v1/users/all").await.assert_status(StatusCode::UNAUTHORIZED);
        let (name, value) = bearer("garbage");
        ctx.server
            .get("/api/v1/clients/show")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        // Authenticated but not an admin
        let (name, value) = bearer(&user_token);
        ctx.server
            .get("/api/v1/users/all")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let (name, value) = bearer(&admin_token);
        let users = ctx.server.get("/api/v1/users/all").add_header(name, value).await;
        users.assert_status(StatusCode::OK);
        let users: ApiResponse<Vec<Value>> = users.json();
        assert_eq!(users.data.len(), 2);
    }

    #[tokio::test]
    async fn test_user_update_is_self_or_admin() {
        let ctx = setup_test_context().await;
        let (dave_id, dave_token) = user_session(&ctx.server, "dave").await;
        let (_, eve_token) = user_session(&ctx.server, "eve").await;

        let (name, value) = bearer(&eve_token);
        ctx.server
            .put(&format!("/api/v1/users/{dave_id}"))
            .add_header(name, value)
            .json(&json!({ "name": "Hacked" }))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let (name, value) = bearer(&dave_token);
        let updated = ctx
            .server
            .put(&format!("/api/v1/users/{dave_id}"))
            .add_header(name, value)
            .json(&json!({ "name": "Dave" }))
            .await;
        updated.assert_status(StatusCode::OK);
        let updated: ApiResponse<Value> = updated.json();
        assert_eq!(updated.data["name"], "Dave");

        // Deleting is admin-only even for your own account
        let (name, value) = bearer(&dave_token);
        ctx.server
            .delete(&format!("/api/v1/users/{dave_id}"))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_purchase_credits_cashback_and_bonus_payment() {
        let ctx = setup_test_context().await;
        let (user_id, token) = user_session(&ctx.server, "shop").await;
        let client_id = create_client(&ctx.server, &token, "+10000000001", 10).await;

        let (name, value) = bearer(&token);
        let receipt = ctx
            .server
            .post(&format!("/api/v1/purchase/create/{client_id}"))
            .add_header(name, value)
            .json(&json!({ "amount": "1000" }))
            .await;
        receipt.assert_status(StatusCode::CREATED);
        let receipt: ApiResponse<Value> = receipt.json();
        assert_eq!(receipt.data["purchase"]["user_id"], user_id);
        assert_eq!(decimal(&receipt.data["cashback"]["amount"]), Decimal::from(100));
        assert_eq!(receipt.data["visit"]["client_id"], client_id);

        // Spendable bonus is the ledger sum times the percentage: 100 × 10
        let (name, value) = bearer(&token);
        ctx.server
            .post("/api/v1/transaction/bill")
            .add_header(name, value)
            .add_query_param("id", client_id)
            .add_query_param("amount", "1001")
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let (name, value) = bearer(&token);
        let paid = ctx
            .server
            .post("/api/v1/transaction/bill")
            .add_header(name, value)
            .add_query_param("id", client_id)
            .add_query_param("amount", "300")
            .await;
        paid.assert_status(StatusCode::OK);
        let paid: ApiResponse<Value> = paid.json();
        assert_eq!(decimal(&paid.data["amount"]), Decimal::from(-300));

        let (name, value) = bearer(&token);
        let ledger = ctx
            .server
            .get(&format!("/api/v1/transaction/client/{client_id}"))
            .add_header(name, value)
            .await;
        ledger.assert_status(StatusCode::OK);
        let ledger: ApiResponse<Vec<Value>> = ledger.json();
        assert_eq!(ledger.data.len(), 2);

        let (name, value) = bearer(&token);
        let overview = ctx.server.get("/api/v1/clients/show").add_header(name, value).await;
        let overview: ApiResponse<Vec<Value>> = overview.json();
        assert_eq!(overview.data.len(), 1);
        assert_eq!(overview.data[0]["visits"].as_array().unwrap().len(), 1);
        assert_eq!(decimal(&overview.data[0]["total_cashback"]), Decimal::from(-200));
    }

    #[tokio::test]
    async fn test_cancel_purchase_debits_cashback() {
        let ctx = setup_test_context().await;
        let (_, token) = user_session(&ctx.server, "undo").await;
        let client_id = create_client(&ctx.server, &token, "+10000000002", 5).await;

        let (name, value) = bearer(&token);
        let receipt: ApiResponse<Value> = ctx
            .server
            .post(&format!("/api/v1/purchase/create/{client_id}"))
            .add_header(name, value)
            .json(&json!({ "amount": "200" }))
            .await
            .json();
        let purchase_id = receipt.data["purchase"]["id"].as_i64().unwrap();

        let (name, value) = bearer(&token);
        let cancelled = ctx
            .server
            .post(&format!("/api/v1/purchase/cancel/{purchase_id}"))
            .add_header(name, value)
            .await;
        cancelled.assert_status(StatusCode::OK);
        let cancelled: ApiResponse<Value> = cancelled.json();
        assert_eq!(decimal(&cancelled.data["debit"]["amount"]), Decimal::from(-10));

        let (name, value) = bearer(&token);
        let purchases: ApiResponse<Vec<Value>> = ctx
            .server
            .get("/api/v1/purchase/all")
            .add_header(name, value)
            .await
            .json();
        assert!(purchases.data.is_empty());

        // The visit stays on record
        let (name, value) = bearer(&token);
        let visits: ApiResponse<Vec<Value>> = ctx
            .server
            .get(&format!("/api/v1/visit/current/{client_id}"))
            .add_header(name, value)
            .await
            .json();
        assert_eq!(visits.data.len(), 1);
    }

    #[tokio::test]
    async fn test_client_ownership() {
        let ctx = setup_test_context().await;
        let (_, owner_token) = user_session(&ctx.server, "owner").await;
        let (stranger_id, stranger_token) = user_session(&ctx.server, "stranger").await;
        let client_id = create_client(&ctx.server, &owner_token, "+10000000003", 3).await;

        let (name, value) = bearer(&stranger_token);
        ctx.server
            .get(&format!("/api/v1/clients/id/{client_id}"))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let (name, value) = bearer(&stranger_token);
        ctx.server
            .get("/api/v1/clients/id/9999")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);

        // Shared with the stranger, the client becomes reachable
        let (name, value) = bearer(&owner_token);
        ctx.server
            .post(&format!("/api/v1/clients/{client_id}/grant"))
            .add_header(name, value)
            .json(&json!({ "user_id": stranger_id }))
            .await
            .assert_status(StatusCode::OK);

        let (name, value) = bearer(&stranger_token);
        let found = ctx
            .server
            .get("/api/v1/clients/current")
            .add_header(name, value)
            .add_query_param("phone", "+10000000003")
            .await;
        found.assert_status(StatusCode::OK);
        let found: ApiResponse<Value> = found.json();
        assert_eq!(found.data["id"], client_id);
    }

    #[tokio::test]
    async fn test_client_quota_enforced() {
        let ctx = setup_test_context().await;
        let (_, admin_token) = admin_session(&ctx, "root").await;
        let (user_id, token) = user_session(&ctx.server, "small").await;

        let (name, value) = bearer(&admin_token);
        ctx.server
            .put(&format!("/api/v1/tarrif/add/{user_id}"))
            .add_header(name, value)
            .json(&json!({ "name": "Tiny", "price": "10", "max_client": 1 }))
            .await
            .assert_status(StatusCode::OK);

        create_client(&ctx.server, &token, "+10000000004", 1).await;

        let (name, value) = bearer(&token);
        ctx.server
            .post("/api/v1/clients/create")
            .add_header(name, value)
            .json(&json!({ "phone": "+10000000005", "cashback_percentage": 1 }))
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_report_window_validation() {
        let ctx = setup_test_context().await;
        let (_, token) = user_session(&ctx.server, "analyst").await;
        let client_id = create_client(&ctx.server, &token, "+10000000010", 5).await;

        let paths = [
            "/api/v1/report/mean-check".to_string(),
            format!("/api/v1/report/mean-check/{client_id}"),
            "/api/v1/report/active".to_string(),
            "/api/v1/report/cohort".to_string(),
            "/api/v1/report/repeat".to_string(),
            "/api/v1/report/churn".to_string(),
            "/api/v1/report/ltv".to_string(),
            "/api/v1/report/average-ltv".to_string(),
            "/api/v1/report/activity-days".to_string(),
            "/api/v1/report/purchase-frequency".to_string(),
            "/api/v1/report/main-metrics".to_string(),
        ];
        for path in &paths {
            let (name, value) = bearer(&token);
            ctx.server
                .get(path)
                .add_header(name, value)
                .add_query_param("days", 30)
                .add_query_param("startDate", "2024-01-01")
                .add_query_param("endDate", "2024-02-01")
                .await
                .assert_status(StatusCode::CONFLICT);
        }

        let (name, value) = bearer(&token);
        ctx.server
            .get("/api/v1/report/active")
            .add_header(name, value)
            .add_query_param("startDate", "2024-01-01")
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let (name, value) = bearer(&token);
        ctx.server
            .get("/api/v1/report/churn")
            .add_header(name, value)
            .add_query_param("days", 1_000_000_000)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let (name, value) = bearer(&token);
        ctx.server
            .get("/api/v1/report/active")
            .add_header(name, value)
            .add_query_param("startDate", "2024-03-01")
            .add_query_param("endDate", "2024-02-01")
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_reports_over_purchases() {
        let ctx = setup_test_context().await;
        let (_, token) = user_session(&ctx.server, "seller").await;
        let first = create_client(&ctx.server, &token, "+10000000006", 5).await;
        create_client(&ctx.server, &token, "+10000000007", 5).await;

        for amount in ["100", "300"] {
            let (name, value) = bearer(&token);
            ctx.server
                .post(&format!("/api/v1/purchase/create/{first}"))
                .add_header(name, value)
                .json(&json!({ "amount": amount }))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let (name, value) = bearer(&token);
        let mean = ctx
            .server
            .get(&format!("/api/v1/report/mean-check/{first}"))
            .add_header(name, value)
            .add_query_param("days", 7)
            .await;
        mean.assert_status(StatusCode::OK);
        let mean: ApiResponse<Value> = mean.json();
        assert_eq!(mean.data["purchase_count"], 2);
        assert_eq!(decimal(&mean.data["average_check"]), Decimal::from(200));

        let (name, value) = bearer(&token);
        let metrics = ctx
            .server
            .get("/api/v1/report/main-metrics")
            .add_header(name, value)
            .await;
        metrics.assert_status(StatusCode::OK);
        let metrics: ApiResponse<Value> = metrics.json();
        assert_eq!(metrics.data["repeat_purchase"]["repeat_clients"], 1);
        assert_eq!(metrics.data["churn"]["churned_clients"], 1);
    }

    #[tokio::test]
    async fn test_manager_acts_for_creator() {
        let ctx = setup_test_context().await;
        let (_, owner_token) = user_session(&ctx.server, "chief").await;

        let (name, value) = bearer(&owner_token);
        let created = ctx
            .server
            .post("/api/v1/manager/create")
            .add_header(name, value)
            .json(&json!({
                "username": "helper",
                "email": email_of("helper"),
                "password": "correct-horse",
            }))
            .await;
        created.assert_status(StatusCode::CREATED);
        let created: ApiResponse<Value> = created.json();
        let manager_id = created.data["id"].as_i64().unwrap();

        let manager_token = login(&ctx.server, "helper").await;
        create_client(&ctx.server, &manager_token, "+10000000008", 2).await;

        let (name, value) = bearer(&owner_token);
        let clients: ApiResponse<Vec<Value>> = ctx
            .server
            .get("/api/v1/clients/show")
            .add_header(name, value)
            .await
            .json();
        assert_eq!(clients.data.len(), 1);

        // Managers cannot manage managers
        let (name, value) = bearer(&manager_token);
        ctx.server
            .get("/api/v1/manager/show")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let (name, value) = bearer(&owner_token);
        ctx.server
            .delete(&format!("/api/v1/manager/{manager_id}"))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::OK);

        ctx.server
            .post("/api/v1/auth/login")
            .json(&json!({ "email": email_of("helper"), "password": "correct-horse" }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_subscription_checkout_and_confirmation() {
        let ctx = setup_test_context().await;
        let (_, token) = user_session(&ctx.server, "payer").await;

        let (name, value) = bearer(&token);
        ctx.server
            .get("/api/v1/bank/buy/gold/1")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let (name, value) = bearer(&token);
        ctx.server
            .get("/api/v1/bank/buy/start/2")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let (name, value) = bearer(&token);
        let form = ctx.server.get("/api/v1/bank/buy/start/3").add_header(name, value).await;
        form.assert_status(StatusCode::OK);
        let form: ApiResponse<Value> = form.json();
        let order_id = form.data["order_id"].as_i64().unwrap();
        assert_eq!(form.data["amount"], "1425");
        assert_eq!(form.data["testing"], "1");
        assert_eq!(
            form.data["success_url"],
            format!("http://localhost:5173/payment/success/{order_id}")
        );
        assert_eq!(form.data["signature"].as_str().unwrap().len(), 40);

        let (name, value) = bearer(&token);
        let status: ApiResponse<Value> = ctx
            .server
            .get("/api/v1/bank/status")
            .add_header(name, value)
            .await
            .json();
        assert_eq!(status.data["active"], false);

        let (name, value) = bearer(&token);
        ctx.server
            .get(&format!("/api/v1/bank/make-success/{order_id}"))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::OK);

        let (name, value) = bearer(&token);
        let status: ApiResponse<Value> = ctx
            .server
            .get("/api/v1/bank/status")
            .add_header(name, value)
            .await
            .json();
        assert_eq!(status.data["active"], true);
        assert_eq!(status.data["plan"], "start");
        assert_eq!(status.data["count_month"], 3);
    }

    #[tokio::test]
    async fn test_password_change_code_mailed_to_caller() {
        let ctx = setup_test_context().await;
        let (_, token) = user_session(&ctx.server, "forgetful").await;

        let (name, value) = bearer(&token);
        ctx.server
            .get("/api/v1/mail/change-pass/123456")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::OK);

        let sent = ctx.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, email_of("forgetful"));
        assert!(sent[0].body.contains("123456"));
    }

    #[tokio::test]
    async fn test_admin_role_and_tariff_management() {
        let ctx = setup_test_context().await;
        let (_, admin_token) = admin_session(&ctx, "chief-admin").await;
        let (user_id, _) = user_session(&ctx.server, "promoted").await;

        let (name, value) = bearer(&admin_token);
        let roles = ctx
            .server
            .put(&format!("/api/v1/roles/users/{user_id}/replace"))
            .add_header(name, value)
            .json(&json!({ "role_name": "manager" }))
            .await;
        roles.assert_status(StatusCode::OK);
        let roles: ApiResponse<Vec<String>> = roles.json();
        assert_eq!(roles.data, vec!["manager".to_string()]);

        let (name, value) = bearer(&admin_token);
        let tariffs: ApiResponse<Vec<Value>> = ctx
            .server
            .get("/api/v1/tarrif/show")
            .add_header(name, value)
            .await
            .json();
        assert_eq!(tariffs.data.len(), 3);

        // The default tariff is in use and cannot go
        let (name, value) = bearer(&admin_token);
        ctx.server
            .delete("/api/v1/tarrif/delete/1")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::CONFLICT);
    }
}
