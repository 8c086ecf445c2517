// tests/api_tests.rs

use std::net::SocketAddr;

use nclex_backend::{config::Config, routes, state::AppState};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app() -> String {
    // Note: For Postgres, you must have a running database.
    // We'll read from DATABASE_URL environment variable.
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    // 1. Create a pool
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is set.");

    // 2. Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    // 3. Create test configuration and state
    let config = Config {
        database_url: database_url.clone(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
    };

    let state = AppState::new(pool, config);

    // 4. Create the router with the app state
    let app = routes::create_router(state);

    // 5. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 6. Spawn the server in the background (connect-info for the limiter)
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    address
}

async fn test_pool() -> PgPool {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .expect("Failed to connect to test DB")
}

/// Seeds one question and returns its id. Options are 1..=4; the ones in
/// `correct_ids` carry the correctness flag.
async fn seed_question(
    pool: &PgPool,
    subject: &str,
    question_type: &str,
    difficulty: &str,
    correct_ids: &[i64],
) -> i64 {
    let options: Vec<serde_json::Value> = (1..=4)
        .map(|id| {
            serde_json::json!({
                "id": id,
                "text": format!("Option {}", id),
                "is_correct": correct_ids.contains(&id),
            })
        })
        .collect();

    sqlx::query_scalar::<_, i64>(
        "INSERT INTO questions (type, content, options, subject, difficulty, rationale) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
    )
    .bind(question_type)
    .bind("A client is admitted with shortness of breath. What should the nurse do first?")
    .bind(serde_json::Value::Array(options))
    .bind(subject)
    .bind(difficulty)
    .bind("Airway always comes first.")
    .fetch_one(pool)
    .await
    .unwrap()
}

/// Registers a fresh user and returns (username, token).
async fn register_and_login(client: &reqwest::Client, address: &str) -> (String, String) {
    let username = format!("u_{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let password = "password123";

    let resp = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({"username": username, "password": password}))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(resp.status().as_u16(), 201);

    let login: serde_json::Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({"username": username, "password": password}))
        .send()
        .await
        .expect("Login failed")
        .json()
        .await
        .expect("Failed to parse login json");

    let token = login["token"].as_str().expect("Token not found").to_string();
    (username, token)
}

fn unique_subject() -> String {
    format!("subj_{}", &uuid::Uuid::new_v4().to_string()[..8])
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_works() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let unique_name = format!("u_{}", &uuid::Uuid::new_v4().to_string()[..8]);

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": unique_name,
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);
}

#[tokio::test]
async fn register_fails_validation() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Username too short
    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": "yo",
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn register_duplicate_is_conflict() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (username, _token) = register_and_login(&client, &address).await;

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({"username": username, "password": "password123"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (username, _token) = register_and_login(&client, &address).await;

    let response = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({"username": username, "password": "wrong_password"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn quick_session_full_flow() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = test_pool().await;
    let subject = unique_subject();

    // 10 single-choice questions, correct option is always 1.
    for _ in 0..10 {
        seed_question(&pool, &subject, "single", "medium", &[1]).await;
    }

    let (_username, token) = register_and_login(&client, &address).await;

    // Start a quick session filtered to our subject.
    let start: serde_json::Value = client
        .post(format!("{}/api/exam/start", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({"mode": "quick", "subject": subject}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let session_id = start["session_id"].as_i64().expect("session_id missing");
    let questions = start["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 10, "quick mode must return exactly 10 questions");
    assert!(start["time_limit_seconds"].is_null(), "quick mode is untimed");

    // The answer key must not travel with the question payload.
    let payload = serde_json::to_string(&start["questions"]).unwrap();
    assert!(!payload.contains("is_correct"));
    assert!(!payload.contains("rationale"));

    // Initial live state.
    let state: serde_json::Value = client
        .get(format!("{}/api/exam/{}", address, session_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(state["current_index"], 0);
    assert_eq!(state["total_questions"], 10);
    assert_eq!(state["completed"], false);

    // Navigation: next, jump (clamped), prev.
    let nav: serde_json::Value = client
        .post(format!("{}/api/exam/{}/position", address, session_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({"action": "next"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(nav["current_index"], 1);

    let nav: serde_json::Value = client
        .post(format!("{}/api/exam/{}/position", address, session_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({"action": "jump", "index": 99}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(nav["current_index"], 9, "jump clamps to the last index");

    // Flag the first question, then unflag it.
    let q0_id = questions[0]["id"].as_i64().unwrap();
    let flag: serde_json::Value = client
        .post(format!("{}/api/exam/{}/flag", address, session_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({"question_id": q0_id}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(flag["flagged"], true);

    let flag: serde_json::Value = client
        .post(format!("{}/api/exam/{}/flag", address, session_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({"question_id": q0_id}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(flag["flagged"], false);

    // An empty selection is rejected locally, never stored.
    let empty = client
        .post(format!("{}/api/exam/{}/answer", address, session_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "question_index": 0,
            "selected_option_ids": [],
            "time_spent_seconds": 5
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status().as_u16(), 400);

    // Answer all 10: first 7 correct (option 1), last 3 wrong (option 2).
    for i in 0..10 {
        let selected = if i < 7 { vec![1] } else { vec![2] };
        let answer: serde_json::Value = client
            .post(format!("{}/api/exam/{}/answer", address, session_id))
            .header("Authorization", format!("Bearer {}", token))
            .json(&serde_json::json!({
                "question_index": i,
                "selected_option_ids": selected,
                "time_spent_seconds": 12
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(answer["correct"], i < 7);
        // The key and rationale come back only now.
        assert_eq!(answer["correct_option_ids"], serde_json::json!([1]));
        assert!(answer["rationale"].is_string());
    }

    // Complete: 7/10 -> score 70.
    let complete: serde_json::Value = client
        .post(format!("{}/api/exam/{}/complete", address, session_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let summary = &complete["summary"];
    assert_eq!(summary["answered"], 10);
    assert_eq!(summary["correct"], 7);
    assert_eq!(summary["incorrect"], 3);
    assert_eq!(summary["score"], 70);
    assert_eq!(summary["by_subject"][&subject]["accuracy"], 70);

    // The live session is gone once completed.
    let gone = client
        .get(format!("{}/api/exam/{}", address, session_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status().as_u16(), 404);

    // The persisted results endpoint recomputes the same summary.
    let results: serde_json::Value = client
        .get(format!("{}/api/exam/{}/results", address, session_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(results["summary"]["score"], 70);
    assert_eq!(results["summary"]["correct"], 7);
}

#[tokio::test]
async fn sata_requires_exact_set_match_over_the_wire() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = test_pool().await;
    let subject = unique_subject();

    // Correct set is {1, 3}.
    seed_question(&pool, &subject, "multiple", "hard", &[1, 3]).await;

    let (_username, token) = register_and_login(&client, &address).await;

    let start: serde_json::Value = client
        .post(format!("{}/api/exam/start", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "mode": "custom",
            "subject": subject,
            "question_count": 1
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let session_id = start["session_id"].as_i64().unwrap();

    let submit = |ids: Vec<i64>| {
        let client = client.clone();
        let address = address.clone();
        let token = token.clone();
        async move {
            client
                .post(format!("{}/api/exam/{}/answer", address, session_id))
                .header("Authorization", format!("Bearer {}", token))
                .json(&serde_json::json!({
                    "question_index": 0,
                    "selected_option_ids": ids,
                    "time_spent_seconds": 20
                }))
                .send()
                .await
                .unwrap()
                .json::<serde_json::Value>()
                .await
                .unwrap()
        }
    };

    // Superset: one extra wrong pick.
    assert_eq!(submit(vec![1, 2, 3]).await["correct"], false);
    // Subset: one correct pick missing.
    assert_eq!(submit(vec![1]).await["correct"], false);
    // Same set, different order.
    assert_eq!(submit(vec![3, 1]).await["correct"], true);
    // Duplicates collapse.
    assert_eq!(submit(vec![1, 1, 3]).await["correct"], true);

    // Overwrite semantics: only the last record counts.
    let complete: serde_json::Value = client
        .post(format!("{}/api/exam/{}/complete", address, session_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(complete["summary"]["answered"], 1);
    assert_eq!(complete["summary"]["score"], 100);
}

#[tokio::test]
async fn undersized_bank_fails_session_start_without_creating_a_session() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = test_pool().await;
    let subject = unique_subject();

    // Only 2 questions; a mock needs 75.
    for _ in 0..2 {
        seed_question(&pool, &subject, "single", "easy", &[1]).await;
    }

    let (_username, token) = register_and_login(&client, &address).await;

    let response = client
        .post(format!("{}/api/exam/start", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({"mode": "mock", "subject": subject}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 422);

    // All-or-nothing: no session record was created.
    let history: Vec<serde_json::Value> = client
        .get(format!("{}/api/profile/sessions", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn srs_draws_from_previously_missed_questions() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = test_pool().await;
    let subject = unique_subject();

    let mut seeded = Vec::new();
    for _ in 0..10 {
        seeded.push(seed_question(&pool, &subject, "single", "medium", &[1]).await);
    }

    let (_username, token) = register_and_login(&client, &address).await;

    // A fresh user has no due pool yet.
    let fresh = client
        .post(format!("{}/api/exam/start", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({"mode": "srs"}))
        .send()
        .await
        .unwrap();
    assert_eq!(fresh.status().as_u16(), 422);

    // Miss everything in a quick round.
    let start: serde_json::Value = client
        .post(format!("{}/api/exam/start", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({"mode": "quick", "subject": subject}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let session_id = start["session_id"].as_i64().unwrap();

    for i in 0..10 {
        client
            .post(format!("{}/api/exam/{}/answer", address, session_id))
            .header("Authorization", format!("Bearer {}", token))
            .json(&serde_json::json!({
                "question_index": i,
                "selected_option_ids": [4],
                "time_spent_seconds": 5
            }))
            .send()
            .await
            .unwrap();
    }
    client
        .post(format!("{}/api/exam/{}/complete", address, session_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();

    // SRS review capped at 5 draws only from the missed pool.
    let srs: serde_json::Value = client
        .post(format!("{}/api/exam/start", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({"mode": "srs", "question_count": 5}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let questions = srs["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 5);
    for q in questions {
        let id = q["id"].as_i64().unwrap();
        assert!(seeded.contains(&id), "SRS drew a question the user never missed");
    }

    // A cap larger than the due pool returns the whole pool, not an error.
    let srs: serde_json::Value = client
        .post(format!("{}/api/exam/start", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({"mode": "srs", "question_count": 50}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(srs["questions"].as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn session_access_is_owner_only() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = test_pool().await;
    let subject = unique_subject();

    for _ in 0..10 {
        seed_question(&pool, &subject, "single", "easy", &[1]).await;
    }

    let (_user_a, token_a) = register_and_login(&client, &address).await;
    let (_user_b, token_b) = register_and_login(&client, &address).await;

    let start: serde_json::Value = client
        .post(format!("{}/api/exam/start", address))
        .header("Authorization", format!("Bearer {}", token_a))
        .json(&serde_json::json!({"mode": "quick", "subject": subject}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let session_id = start["session_id"].as_i64().unwrap();

    let response = client
        .get(format!("{}/api/exam/{}", address, session_id))
        .header("Authorization", format!("Bearer {}", token_b))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn admin_question_crud() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = test_pool().await;

    // Seed an admin directly; registration always creates plain users.
    let admin_name = format!("adm_{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let hashed = nclex_backend::utils::hash::hash_password("adminpass").unwrap();
    sqlx::query("INSERT INTO users (username, password, role) VALUES ($1, $2, 'admin')")
        .bind(&admin_name)
        .bind(&hashed)
        .execute(&pool)
        .await
        .unwrap();

    let login: serde_json::Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({"username": admin_name, "password": "adminpass"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let admin_token = login["token"].as_str().unwrap().to_string();

    let subject = unique_subject();
    let valid_question = serde_json::json!({
        "question_type": "single",
        "content": "Which action should the nurse take <b>first</b>?<script>alert(1)</script>",
        "options": [
            {"id": 1, "text": "Assess the airway", "is_correct": true},
            {"id": 2, "text": "Call the provider", "is_correct": false}
        ],
        "subject": subject,
        "difficulty": "medium",
        "rationale": "Airway first."
    });

    // Create.
    let created = client
        .post(format!("{}/api/admin/questions", address))
        .header("Authorization", format!("Bearer {}", admin_token))
        .json(&valid_question)
        .send()
        .await
        .unwrap();
    assert_eq!(created.status().as_u16(), 201);
    let question_id = created.json::<serde_json::Value>().await.unwrap()["id"]
        .as_i64()
        .unwrap();

    // Invariant: a single-choice question with two correct options is rejected.
    let invalid = client
        .post(format!("{}/api/admin/questions", address))
        .header("Authorization", format!("Bearer {}", admin_token))
        .json(&serde_json::json!({
            "question_type": "single",
            "content": "Broken key",
            "options": [
                {"id": 1, "text": "A", "is_correct": true},
                {"id": 2, "text": "B", "is_correct": true}
            ],
            "subject": subject,
            "difficulty": "easy"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(invalid.status().as_u16(), 400);

    // The stored stem was sanitized.
    let listed: Vec<serde_json::Value> = client
        .get(format!("{}/api/admin/questions?subject={}", address, subject))
        .header("Authorization", format!("Bearer {}", admin_token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert!(!listed[0]["content"].as_str().unwrap().contains("script"));

    // Update difficulty.
    let updated = client
        .put(format!("{}/api/admin/questions/{}", address, question_id))
        .header("Authorization", format!("Bearer {}", admin_token))
        .json(&serde_json::json!({"difficulty": "hard"}))
        .send()
        .await
        .unwrap();
    assert_eq!(updated.status().as_u16(), 200);

    // Non-admins are shut out.
    let (_user, user_token) = register_and_login(&client, &address).await;
    let forbidden = client
        .post(format!("{}/api/admin/questions", address))
        .header("Authorization", format!("Bearer {}", user_token))
        .json(&valid_question)
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status().as_u16(), 403);

    // Delete.
    let deleted = client
        .delete(format!("{}/api/admin/questions/{}", address, question_id))
        .header("Authorization", format!("Bearer {}", admin_token))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status().as_u16(), 204);
}
