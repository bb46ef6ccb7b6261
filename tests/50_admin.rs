mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;
use servicehub_api::database::Store;
use servicehub_api::models::{Profile, Role};

#[tokio::test]
async fn first_admin_bootstraps_superadmin() -> Result<()> {
    let app = TestApp::new();

    let res = app
        .post(
            "/api/admin/signup",
            json!({ "name": "Root", "email": "root@example.com", "phone": "9000000001" }),
            None,
        )
        .await?;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["data"]["profile"]["kind"], "admin");
    assert_eq!(res.body["data"]["profile"]["superadmin"], true);

    // A second unauthenticated signup is refused
    let res = app
        .post(
            "/api/admin/signup",
            json!({ "name": "Mallory", "email": "mallory@example.com", "phone": "9000000002" }),
            None,
        )
        .await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    // The superadmin may add admins, who are not superadmins
    let root = app.verify("/api/admin", "root@example.com").await?;
    let res = app
        .post(
            "/api/admin/signup",
            json!({ "name": "Helper", "email": "helper@example.com", "phone": "9000000003" }),
            Some(&root),
        )
        .await?;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["data"]["profile"]["superadmin"], false);

    // ...and a plain admin may not
    let helper = app.verify("/api/admin", "helper@example.com").await?;
    let res = app
        .post(
            "/api/admin/signup",
            json!({ "name": "Another", "email": "another@example.com", "phone": "9000000004" }),
            Some(&helper),
        )
        .await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(app.store.count_identities(Role::Admin).await?, 2);
    Ok(())
}

#[tokio::test]
async fn superadmin_deletes_admins_but_not_self() -> Result<()> {
    let app = TestApp::new();
    let (root, root_token) = app.admin_session("root@example.com").await?;
    let helper = app
        .seed("helper@example.com", "Helper", Profile::Admin { superadmin: false })
        .await?;
    let helper_token = app.login("/api/admin", "helper@example.com").await?;

    let res = app.delete(&format!("/api/admin/admins/{}", root.id), Some(&helper_token)).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app.delete(&format!("/api/admin/admins/{}", root.id), Some(&root_token)).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app.delete(&format!("/api/admin/admins/{}", helper.id), Some(&root_token)).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert!(app.store.find_identity(helper.id).await?.is_none());

    let res = app.delete(&format!("/api/admin/admins/{}", helper.id), Some(&root_token)).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn recruited_employee_waits_for_activation() -> Result<()> {
    let app = TestApp::new();
    let category = app.seed_category("Electrical", 200, 3000).await?;
    let (_, admin) = app.admin_session("root@example.com").await?;

    let res = app
        .post(
            "/api/admin/field-execs",
            json!({
                "name": "Field Exec",
                "email": "fe@example.com",
                "phone": "9000000005",
                "pincode": "560001",
                "block": "Indiranagar"
            }),
            Some(&admin),
        )
        .await?;
    assert_eq!(res.status, StatusCode::CREATED);
    let field_exec = app.verify("/api/field-exec", "fe@example.com").await?;

    let res = app
        .post(
            "/api/field-exec/employees",
            json!({ "name": "Pat", "email": "pat@example.com", "phone": "9000000006", "category_id": category.id }),
            Some(&field_exec),
        )
        .await?;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["data"]["is_active"], false);
    let employee_id = res.body["data"]["id"].as_str().unwrap().to_string();

    let res = app.get("/api/field-exec/employees", Some(&field_exec)).await?;
    assert_eq!(res.body["data"].as_array().unwrap().len(), 1);

    // Not active yet
    let res = app.post("/api/employee/login", json!({ "email": "pat@example.com" }), None).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app
        .put(&format!("/api/admin/employees/{}/activate", employee_id), json!({}), Some(&admin))
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["is_active"], true);

    let employee = app.login("/api/employee", "pat@example.com").await?;

    let res = app
        .put(
            "/api/employee/bank",
            json!({ "account_holder": "Pat Kumar", "account_number": "123456789012", "ifsc": "HDFC0001234" }),
            Some(&employee),
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["profile"]["bank"]["ifsc"], "HDFC0001234");

    let res = app
        .put(
            "/api/employee/bank",
            json!({ "account_holder": "Pat Kumar", "account_number": "1234", "ifsc": "HDFC1001234" }),
            Some(&employee),
        )
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.body["field_errors"]["account_number"].is_string());
    assert!(res.body["field_errors"]["ifsc"].is_string());

    let res = app.get(&format!("/api/admin/employees/category/{}", category.id), Some(&admin)).await?;
    assert_eq!(res.body["data"].as_array().unwrap().len(), 1);

    let res = app
        .put(&format!("/api/admin/employees/{}/deactivate", employee_id), json!({}), Some(&admin))
        .await?;
    assert_eq!(res.body["data"]["is_active"], false);
    let res = app.post("/api/employee/login", json!({ "email": "pat@example.com" }), None).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn field_exec_updates_profile() -> Result<()> {
    let app = TestApp::new();
    app.seed(
        "fe@example.com",
        "Field Exec",
        Profile::FieldExec { pincode: "560001".into(), block: "North".into() },
    )
    .await?;
    let token = app.login("/api/field-exec", "fe@example.com").await?;

    let res = app.put("/api/field-exec/profile", json!({ "pincode": "5600" }), Some(&token)).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .put("/api/field-exec/profile", json!({ "pincode": "560034", "block": "Koramangala" }), Some(&token))
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["profile"]["pincode"], "560034");
    assert_eq!(res.body["data"]["profile"]["block"], "Koramangala");
    Ok(())
}

#[tokio::test]
async fn catalog_management_and_public_reads() -> Result<()> {
    let app = TestApp::new();
    let (_, admin) = app.admin_session("root@example.com").await?;

    let res = app
        .post(
            "/api/admin/categories",
            json!({ "name": "Carpentry", "description": "Furniture repair", "min_price": 300, "max_price": 100 }),
            Some(&admin),
        )
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .post(
            "/api/admin/categories",
            json!({ "name": "Carpentry", "description": "Furniture repair", "min_price": 300, "max_price": 3000 }),
            Some(&admin),
        )
        .await?;
    assert_eq!(res.status, StatusCode::CREATED);
    let category_id = res.body["data"]["id"].as_str().unwrap().to_string();

    let res = app
        .put(&format!("/api/admin/categories/{}", category_id), json!({ "max_price": 5000 }), Some(&admin))
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["max_price"], 5000);

    let res = app.get("/api/categories", None).await?;
    assert_eq!(res.body["data"].as_array().unwrap().len(), 1);
    let res = app.get(&format!("/api/categories/{}", category_id), None).await?;
    assert_eq!(res.status, StatusCode::OK);

    app.delete(&format!("/api/admin/categories/{}", category_id), Some(&admin)).await?;
    let res = app.get("/api/categories", None).await?;
    assert!(res.body["data"].as_array().unwrap().is_empty());
    let res = app.get(&format!("/api/categories/{}", category_id), None).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app
        .post(
            "/api/admin/careers",
            json!({ "title": "Field Executive", "description": "Recruit providers", "location": "Bengaluru" }),
            Some(&admin),
        )
        .await?;
    assert_eq!(res.status, StatusCode::CREATED);
    let career_id = res.body["data"]["id"].as_str().unwrap().to_string();

    let res = app.get("/api/careers", None).await?;
    assert_eq!(res.body["data"][0]["title"], "Field Executive");

    app.delete(&format!("/api/admin/careers/{}", career_id), Some(&admin)).await?;
    let res = app.get("/api/careers", None).await?;
    assert!(res.body["data"].as_array().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn user_updates_profile() -> Result<()> {
    let app = TestApp::new();
    let (_, token) = app.user_session("sam@example.com").await?;

    let res = app
        .put("/api/user/profile", json!({ "name": "Sam Rao", "address": "4 Hill Street" }), Some(&token))
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["name"], "Sam Rao");
    assert_eq!(res.body["data"]["profile"]["address"], "4 Hill Street");

    let res = app.put("/api/user/profile", json!({ "phone": "12345" }), Some(&token)).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn deleted_admin_token_stops_working() -> Result<()> {
    let app = TestApp::new();
    let (_, root_token) = app.admin_session("root@example.com").await?;
    let helper = app
        .seed("helper@example.com", "Helper", Profile::Admin { superadmin: false })
        .await?;
    let helper_token = app.login("/api/admin", "helper@example.com").await?;

    let category = json!({ "name": "Plumbing", "min_price": 100, "max_price": 900 });
    let res = app.post("/api/admin/categories", category.clone(), Some(&helper_token)).await?;
    assert_eq!(res.status, StatusCode::CREATED);

    let res = app.delete(&format!("/api/admin/admins/{}", helper.id), Some(&root_token)).await?;
    assert_eq!(res.status, StatusCode::OK);

    let category = json!({ "name": "Painting", "min_price": 100, "max_price": 900 });
    let res = app.post("/api/admin/categories", category, Some(&helper_token)).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.store.list_categories(true).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn category_price_band_must_be_ordered() -> Result<()> {
    let app = TestApp::new();
    let (_, admin) = app.admin_session("root@example.com").await?;

    let res = app
        .post("/api/admin/categories", json!({ "name": "Plumbing", "min_price": 900, "max_price": 100 }), Some(&admin))
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["field_errors"]["max_price"], "must not be below min_price");

    let res = app
        .post("/api/admin/categories", json!({ "name": "P", "min_price": 0, "max_price": 100 }), Some(&admin))
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.body["field_errors"]["name"].is_string());
    assert_eq!(res.body["field_errors"]["min_price"], "must be greater than zero");
    Ok(())
}
