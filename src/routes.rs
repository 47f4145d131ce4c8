use actix_web::{delete, get, post, put, web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::balance::BalanceEngine;
use crate::directory::Directory;
use crate::error::SplitError;
use crate::ledger::Ledger;
use crate::schemas::{Email, NewExpense};
use crate::store::SharedStore;

type HandlerResult = Result<HttpResponse, SplitError>;

#[derive(Clone)]
pub struct AppState {
    pub directory: Directory,
    pub ledger: Ledger,
    pub balances: BalanceEngine,
}

impl AppState {
    pub fn new(store: SharedStore) -> Self {
        let directory = Directory::new(store.clone());
        let ledger = Ledger::new(store, directory.clone());
        let balances = BalanceEngine::new(ledger.clone(), directory.clone());
        AppState {
            directory,
            ledger,
            balances,
        }
    }
}

#[derive(Deserialize, Serialize)]
struct UserJson {
    name: String,
    email: Email,
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct FriendLinkJson {
    current_user_email: Email,
    email: Email,
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewExpenseJson {
    current_user_email: Email,
    new_expense: NewExpense,
}

#[derive(Deserialize, Serialize)]
struct SettleJson {
    email: Email,
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewGroupJson {
    email: Email,
    group_name: String,
    members: Vec<Email>,
}

#[get("/keep-alive")]
async fn keep_alive() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "message": "Hello!" }))
}

#[get("/users")]
async fn list_users(state: web::Data<AppState>) -> HandlerResult {
    let users = state.directory.list_users().await?;
    Ok(HttpResponse::Ok().json(json!({ "users": users })))
}

#[post("/users")]
async fn create_user(state: web::Data<AppState>, json: web::Json<UserJson>) -> HandlerResult {
    let user = state.directory.create_user(&json.name, &json.email).await?;
    Ok(HttpResponse::Created().json(json!({ "user": user })))
}

#[post("/friends")]
async fn add_friend(state: web::Data<AppState>, json: web::Json<FriendLinkJson>) -> HandlerResult {
    state
        .directory
        .add_friend_link(&json.current_user_email, &json.email)
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Friend added" })))
}

#[get("/users/{email}/friends")]
async fn friends(state: web::Data<AppState>, email: web::Path<Email>) -> HandlerResult {
    let summaries = state.balances.friend_summary(&email).await?;
    Ok(HttpResponse::Ok().json(json!({ "friends": summaries })))
}

#[get("/users/{email}/friends/{friend}")]
async fn friend(state: web::Data<AppState>, path: web::Path<(Email, Email)>) -> HandlerResult {
    let (email, friend_email) = path.into_inner();
    let details = state.balances.friend_details(&email, &friend_email).await?;
    Ok(HttpResponse::Ok().json(json!({ "friendDetails": details })))
}

#[get("/users/{email}/balance/{other}")]
async fn pairwise_balance(
    state: web::Data<AppState>,
    path: web::Path<(Email, Email)>,
) -> HandlerResult {
    let (email, other) = path.into_inner();
    let balance = state.balances.pairwise_balance(&email, &other).await?;
    Ok(HttpResponse::Ok().json(json!({ "user": email, "other": other, "balance": balance })))
}

#[get("/users/{email}/expenses")]
async fn user_expenses(state: web::Data<AppState>, email: web::Path<Email>) -> HandlerResult {
    let expenses = state.ledger.expenses_involving(&email).await?;
    Ok(HttpResponse::Ok().json(json!({ "expenses": expenses })))
}

#[post("/users/{email}/expenses/reindex")]
async fn reindex_expenses(state: web::Data<AppState>, email: web::Path<Email>) -> HandlerResult {
    let expenses = state.ledger.rebuild_expense_index(&email).await?;
    Ok(HttpResponse::Ok().json(json!({ "expenses": expenses })))
}

#[get("/users/{email}/groups")]
async fn user_groups(state: web::Data<AppState>, email: web::Path<Email>) -> HandlerResult {
    let groups: Vec<_> = state
        .directory
        .groups_for_user(&email)
        .await?
        .iter()
        .map(|g| g.reference())
        .collect();
    Ok(HttpResponse::Ok().json(json!({ "groups": groups })))
}

#[post("/expenses")]
async fn add_expense(state: web::Data<AppState>, json: web::Json<NewExpenseJson>) -> HandlerResult {
    let NewExpenseJson {
        current_user_email,
        new_expense,
    } = json.into_inner();
    let expense = state
        .ledger
        .record_expense(&current_user_email, new_expense)
        .await?;
    Ok(HttpResponse::Created().json(json!({ "expense": expense })))
}

#[get("/expenses/{id}")]
async fn expense_details(state: web::Data<AppState>, id: web::Path<String>) -> HandlerResult {
    let breakdown = state.balances.expense_breakdown(&id).await?;
    Ok(HttpResponse::Ok().json(breakdown))
}

#[put("/expenses/{id}/settle")]
async fn settle_expense(
    state: web::Data<AppState>,
    id: web::Path<String>,
    json: web::Json<SettleJson>,
) -> HandlerResult {
    let expense = state.ledger.settle_expense(&id, &json.email).await?;
    Ok(HttpResponse::Ok().json(json!({ "expense": expense })))
}

#[delete("/expenses/{id}")]
async fn delete_expense(state: web::Data<AppState>, id: web::Path<String>) -> HandlerResult {
    let expense = state.ledger.delete_expense(&id).await?;
    Ok(HttpResponse::Ok().json(json!({ "deletedExpense": expense })))
}

#[post("/groups")]
async fn add_group(state: web::Data<AppState>, json: web::Json<NewGroupJson>) -> HandlerResult {
    let NewGroupJson {
        email,
        group_name,
        members,
    } = json.into_inner();
    let group = state
        .directory
        .create_group(&email, &group_name, members)
        .await?;
    Ok(HttpResponse::Created().json(json!({ "group": group })))
}

#[get("/groups/{id}/balance")]
async fn group_balance(state: web::Data<AppState>, id: web::Path<String>) -> HandlerResult {
    let summary = state.balances.group_summary(&id).await?;
    Ok(HttpResponse::Ok().json(summary))
}

#[get("/groups/{id}/balance/{email}")]
async fn member_group_balance(
    state: web::Data<AppState>,
    path: web::Path<(String, Email)>,
) -> HandlerResult {
    let (id, email) = path.into_inner();
    let balance = state.balances.user_group_balance(&id, &email).await?;
    Ok(HttpResponse::Ok().json(balance))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _| {
        SplitError::InvalidInput(err.to_string()).into()
    }))
    .service(keep_alive)
    .service(list_users)
    .service(create_user)
    .service(add_friend)
    .service(friends)
    .service(friend)
    .service(pairwise_balance)
    .service(user_expenses)
    .service(reindex_expenses)
    .service(user_groups)
    .service(add_expense)
    .service(expense_details)
    .service(settle_expense)
    .service(delete_expense)
    .service(add_group)
    .service(group_balance)
    .service(member_group_balance);
}
