//! Integration tests for the ArkABA backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::chat::ChatHub;
use crate::config::{Config, LogFormat, MailConfig, StripeConfig};
use crate::db::{init_database, Repository};
use crate::errors::AppError;
use crate::mail::{Email, Mailer};
use crate::payments::{signature_header, IntentStatus, NewIntent, PaymentGateway, PaymentIntent};
use crate::search::SearchIndex;
use crate::{create_router, tasks, AppState};

const PSK: &str = "test-api-key";
const WEBHOOK_SECRET: &str = "whsec_test";

/// Gateway that keeps intents in memory; tests decide when they succeed.
#[derive(Default)]
struct FakeGateway {
    intents: Mutex<HashMap<String, PaymentIntent>>,
    next_id: AtomicUsize,
    fail_creates: std::sync::atomic::AtomicBool,
}

impl FakeGateway {
    fn set_status(&self, id: &str, status: IntentStatus) {
        let mut intents = self.intents.lock().unwrap();
        intents.get_mut(id).expect("unknown intent").status = status;
    }

    fn get(&self, id: &str) -> PaymentIntent {
        self.intents.lock().unwrap().get(id).cloned().expect("unknown intent")
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_intent(&self, intent: &NewIntent<'_>) -> Result<PaymentIntent, AppError> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(AppError::Payment("card network down".to_string()));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = format!("pi_test_{}", n);
        let created = PaymentIntent {
            id: id.clone(),
            client_secret: Some(format!("{}_secret", id)),
            status: IntentStatus::RequiresPaymentMethod,
            amount: intent.amount_cents,
            currency: intent.currency.to_string(),
            metadata: HashMap::from([
                ("kind".to_string(), intent.purpose.as_str().to_string()),
                ("id".to_string(), intent.target_id.to_string()),
            ]),
        };
        self.intents.lock().unwrap().insert(id, created.clone());
        Ok(created)
    }

    async fn retrieve_intent(&self, id: &str) -> Result<PaymentIntent, AppError> {
        self.intents
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Payment not found: {}", id)))
    }
}

/// Mailer that records what would have been sent.
#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
    fail: std::sync::atomic::AtomicBool,
}

impl RecordingMailer {
    fn subjects(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|m| m.subject.clone()).collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: Email) -> Result<(), AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Mail("relay down".to_string()));
        }
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    state: AppState,
    gateway: Arc<FakeGateway>,
    mailer: Arc<RecordingMailer>,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    async fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");
        let index_path = temp_dir.path().join("index");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        // Initialize search index
        let search = Arc::new(SearchIndex::open(&index_path).expect("Failed to init search"));

        // Create config
        let mut config = Config {
            api_psk: Some(PSK.to_string()),
            db_path,
            index_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            log_format: LogFormat::Pretty,
            stripe: StripeConfig {
                secret_key: Some("sk_test".to_string()),
                webhook_secret: Some(WEBHOOK_SECRET.to_string()),
                api_base: "http://127.0.0.1:9".to_string(),
            },
            mail: MailConfig {
                relay_url: None,
                from: "ArkABA <no-reply@arkaba.org>".to_string(),
                admin_email: "admin@arkaba.org".to_string(),
            },
            currency: "usd".to_string(),
            membership_term_days: 365,
            registration_hold_minutes: 30,
        };
        adjust(&mut config);
        let psk = config.api_psk.clone();

        let gateway = Arc::new(FakeGateway::default());
        let mailer = Arc::new(RecordingMailer::default());

        let state = AppState {
            repo,
            search,
            config: Arc::new(config),
            payments: gateway.clone(),
            mailer: mailer.clone(),
            chat: ChatHub::default(),
        };

        let app = create_router(state.clone());

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let mut client_builder = Client::builder();
        if let Some(key) = psk {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("x-api-key", key.parse().unwrap());
            client_builder = client_builder.default_headers(headers);
        }

        TestFixture {
            client: client_builder.build().unwrap(),
            base_url,
            state,
            gateway,
            mailer,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self.client.post(self.url(path)).json(&body).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn put(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self.client.put(self.url(path)).json(&body).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn delete(&self, path: &str) -> (u16, Value) {
        let resp = self.client.delete(self.url(path)).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn create_event(&self, extra: Value) -> Value {
        let mut body = json!({
            "title": "Spring Conference",
            "description": "Annual meeting of Arkansas behavior analysts",
            "location": "Little Rock",
            "startsAt": (Utc::now() + chrono::Duration::days(30)).to_rfc3339(),
            "nonMemberPriceCents": 0
        });
        for (k, v) in extra.as_object().unwrap() {
            body[k] = v.clone();
        }
        let (status, body) = self.post("/api/admin/events", body).await;
        assert_eq!(status, 200, "{}", body);
        body["data"].clone()
    }

    /// Sign up and pay dues; returns the active member.
    async fn active_member(&self, email: &str, role: &str) -> Value {
        let (status, body) = self
            .post(
                "/api/members/signup",
                json!({"firstName": "Pat", "lastName": "Lee", "email": email, "role": role}),
            )
            .await;
        assert_eq!(status, 200, "{}", body);
        let member_id = body["data"]["member"]["id"].as_str().unwrap().to_string();
        let intent_id = body["data"]["payment"]["paymentIntentId"]
            .as_str()
            .unwrap()
            .to_string();

        self.gateway.set_status(&intent_id, IntentStatus::Succeeded);
        let (status, body) = self
            .post(
                &format!("/api/members/{}/confirm", member_id),
                json!({"paymentIntentId": intent_id}),
            )
            .await;
        assert_eq!(status, 200, "{}", body);
        body["data"].clone()
    }
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_admin_routes_require_psk() {
    let fixture = TestFixture::new().await;
    let anonymous = Client::new();

    let resp = anonymous
        .get(fixture.url("/api/admin/dashboard"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let resp = anonymous
        .get(fixture.url("/api/admin/dashboard"))
        .header("x-api-key", "wrong-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = anonymous
        .get(fixture.url("/api/admin/dashboard"))
        .bearer_auth(PSK)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Public routes never need the key
    let resp = anonymous.get(fixture.url("/api/blogs")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_no_psk_configured_opens_admin() {
    let fixture = TestFixture::with_config(|config| config.api_psk = None).await;
    let (status, body) = fixture.get("/api/admin/members").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_blog_publish_flow() {
    let fixture = TestFixture::new().await;

    let (status, draft) = fixture
        .post(
            "/api/admin/blogs",
            json!({"title": "Fall Conference Recap", "author": "Board", "content": "Thanks to all who came."}),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(draft["data"]["slug"], "fall-conference-recap");
    assert_eq!(draft["data"]["published"], false);
    assert_eq!(draft["data"]["version"], 1);
    let id = draft["data"]["id"].as_str().unwrap().to_string();

    // Drafts are hidden from the public site
    let (_, list) = fixture.get("/api/blogs").await;
    assert_eq!(list["data"], json!([]));
    let (status, _) = fixture.get("/api/blogs/fall-conference-recap").await;
    assert_eq!(status, 404);

    let (status, published) = fixture
        .put(
            &format!("/api/admin/blogs/{}", id),
            json!({"published": true, "expectedVersion": 1}),
        )
        .await;
    assert_eq!(status, 200);
    assert!(published["data"]["publishedAt"].is_string());
    assert!(published["revisionId"].as_i64().unwrap() > draft["revisionId"].as_i64().unwrap());

    let (status, public) = fixture.get("/api/blogs/fall-conference-recap").await;
    assert_eq!(status, 200);
    assert_eq!(public["data"]["title"], "Fall Conference Recap");

    // A stale version is rejected with the current one
    let (status, stale) = fixture
        .put(
            &format!("/api/admin/blogs/{}", id),
            json!({"title": "Edited", "expectedVersion": 1}),
        )
        .await;
    assert_eq!(status, 409);
    assert_eq!(stale["error"]["code"], "VERSION_MISMATCH");
    assert_eq!(stale["error"]["details"]["currentVersion"], 2);

    // Same title means the same slug
    let (status, dup) = fixture
        .post(
            "/api/admin/blogs",
            json!({"title": "Fall conference recap!", "author": "Board", "content": "Again"}),
        )
        .await;
    assert_eq!(status, 409);
    assert_eq!(dup["error"]["code"], "CONFLICT");

    let (status, _) = fixture.delete(&format!("/api/admin/blogs/{}", id)).await;
    assert_eq!(status, 200);
    let (status, _) = fixture.get(&format!("/api/admin/blogs/{}", id)).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_content_validation() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .post(
            "/api/admin/blogs",
            json!({"title": "  ", "author": "Board", "content": "x"}),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = fixture
        .post(
            "/api/admin/courses",
            json!({"title": "Ethics", "description": "Ethics for behavior analysts", "instructor": "Dr. Smith", "ceuCredits": 0}),
        )
        .await;
    assert_eq!(status, 400);

    let (status, _) = fixture
        .post(
            "/api/admin/courses",
            json!({"title": "Ethics", "description": "Ethics for behavior analysts", "instructor": "Dr. Smith", "ceuCredits": 2, "priceCents": -5}),
        )
        .await;
    assert_eq!(status, 400);

    let (status, body) = fixture
        .post(
            "/api/admin/courses",
            json!({"title": "Ethics", "description": "   ", "instructor": "Dr. Smith", "ceuCredits": 2}),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, course) = fixture
        .post(
            "/api/admin/courses",
            json!({"title": "Ethics", "description": "Ethics for behavior analysts", "instructor": "Dr. Smith", "ceuCredits": 2}),
        )
        .await;
    assert_eq!(status, 200);
    let course_id = course["data"]["id"].as_str().unwrap().to_string();
    let (status, _) = fixture
        .put(&format!("/api/admin/courses/{}", course_id), json!({"description": ""}))
        .await;
    assert_eq!(status, 400);

    let (status, _) = fixture
        .post(
            "/api/admin/jobs",
            json!({"title": "BCBA", "organization": "", "location": "Conway", "description": "Clinic role"}),
        )
        .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_jobs_hide_expired_postings() {
    let fixture = TestFixture::new().await;

    let (_, open) = fixture
        .post(
            "/api/admin/jobs",
            json!({"title": "Clinical Director", "organization": "Natural State ABA", "location": "Fayetteville", "description": "Lead the clinic"}),
        )
        .await;
    let (_, expired) = fixture
        .post(
            "/api/admin/jobs",
            json!({
                "title": "RBT",
                "organization": "Delta Behavior",
                "location": "Jonesboro",
                "description": "Part time",
                "employmentType": "part_time",
                "expiresAt": (Utc::now() - chrono::Duration::days(1)).to_rfc3339()
            }),
        )
        .await;

    let (_, public) = fixture.get("/api/jobs").await;
    let ids: Vec<&str> = public["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|j| j["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![open["data"]["id"].as_str().unwrap()]);

    let (status, _) = fixture
        .get(&format!("/api/jobs/{}", expired["data"]["id"].as_str().unwrap()))
        .await;
    assert_eq!(status, 404);

    let (_, admin) = fixture.get("/api/admin/jobs").await;
    assert_eq!(admin["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_search_follows_content_writes() {
    let fixture = TestFixture::new().await;

    let (_, course) = fixture
        .post(
            "/api/admin/courses",
            json!({
                "title": "Supervision Essentials",
                "description": "The 8-hour supervision training",
                "instructor": "Dr. Rivera",
                "ceuCredits": 8,
                "ceuCategory": "supervision"
            }),
        )
        .await;
    let course_id = course["data"]["id"].as_str().unwrap().to_string();

    let (status, found) = fixture.get("/api/search?q=supervision").await;
    assert_eq!(status, 200);
    assert_eq!(found["data"]["total"], 1);
    assert_eq!(found["data"]["results"][0]["kind"], "course");
    assert_eq!(found["data"]["results"][0]["id"], course_id);

    fixture
        .put(
            &format!("/api/admin/courses/{}", course_id),
            json!({"published": false}),
        )
        .await;
    let (_, hidden) = fixture.get("/api/search?q=supervision").await;
    assert_eq!(hidden["data"]["total"], 0);

    let (status, limited) = fixture.get("/api/search?q=anything&limit=500").await;
    assert_eq!(status, 200);
    assert_eq!(limited["data"]["limit"], 50);

    let (status, bad) = fixture.get("/api/search?q=nosuchfield:x").await;
    assert_eq!(status, 400);
    assert_eq!(bad["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_search_rejects_out_of_range_offsets() {
    let fixture = TestFixture::new().await;
    fixture.create_event(json!({"title": "Fall Conference"})).await;

    for offset in ["18446744073709551615", "100000000000000"] {
        let (status, body) = fixture
            .get(&format!("/api/search?q=conference&offset={}", offset))
            .await;
        assert_eq!(status, 400, "{}", body);
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }

    let (status, deep) = fixture.get("/api/search?q=conference&offset=10000").await;
    assert_eq!(status, 200);
    assert_eq!(deep["data"]["total"], 1);
    assert_eq!(deep["data"]["results"], json!([]));

    let (status, _) = fixture.get("/health").await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_sweep_drops_expired_jobs_from_search() {
    let fixture = TestFixture::new().await;
    let (status, _) = fixture
        .post(
            "/api/admin/jobs",
            json!({
                "title": "Registered Behavior Technician",
                "organization": "Delta Autism Center",
                "location": "Jonesboro",
                "description": "Part-time RBT role",
                "expiresAt": (Utc::now() + chrono::Duration::hours(1)).to_rfc3339()
            }),
        )
        .await;
    assert_eq!(status, 200);

    let (_, found) = fixture.get("/api/search?q=technician").await;
    assert_eq!(found["data"]["total"], 1);

    let report = tasks::sweep(&fixture.state, Utc::now()).await.unwrap();
    assert!(!report.reindexed);

    let later = Utc::now() + chrono::Duration::hours(2);
    let report = tasks::sweep(&fixture.state, later).await.unwrap();
    assert!(report.reindexed);

    let (_, gone) = fixture.get("/api/search?q=technician").await;
    assert_eq!(gone["data"]["total"], 0);
}

#[tokio::test]
async fn test_blog_search_hit_has_id_and_slug() {
    let fixture = TestFixture::new().await;
    let (status, blog) = fixture
        .post(
            "/api/admin/blogs",
            json!({"title": "Ethics Corner", "author": "Board", "content": "Dual relationships", "published": true}),
        )
        .await;
    assert_eq!(status, 200);
    let blog_id = blog["data"]["id"].as_str().unwrap().to_string();

    let (_, found) = fixture.get("/api/search?q=ethics").await;
    assert_eq!(found["data"]["total"], 1);
    let hit = &found["data"]["results"][0];
    assert_eq!(hit["kind"], "blog");
    assert_eq!(hit["id"], blog_id.as_str());
    assert_eq!(hit["slug"], "ethics-corner");

    let (status, by_id) = fixture.get(&format!("/api/admin/blogs/{}", blog_id)).await;
    assert_eq!(status, 200);
    assert_eq!(by_id["data"]["title"], "Ethics Corner");
    let (status, _) = fixture.get("/api/blogs/ethics-corner").await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_quote_uses_active_member_tier() {
    let fixture = TestFixture::new().await;
    let event = fixture
        .create_event(json!({
            "nonMemberPriceCents": 10000,
            "memberPriceCents": 6000,
            "tierPrices": [{"role": "student", "priceCents": 2000}]
        }))
        .await;
    let event_id = event["id"].as_str().unwrap();

    let (_, anon) = fixture
        .get(&format!("/api/events/{}/quote?email=nobody@example.com", event_id))
        .await;
    assert_eq!(anon["data"]["pricingTier"], "non_member");
    assert_eq!(anon["data"]["priceCents"], 10000);

    fixture.active_member("student@example.com", "student").await;
    let (_, student) = fixture
        .get(&format!("/api/events/{}/quote?email=STUDENT@example.com", event_id))
        .await;
    assert_eq!(student["data"]["pricingTier"], "student");
    assert_eq!(student["data"]["priceCents"], 2000);
    assert_eq!(student["data"]["currency"], "usd");

    let pro = fixture.active_member("pro@example.com", "professional").await;
    let (_, member) = fixture
        .get(&format!(
            "/api/events/{}/quote?memberId={}",
            event_id,
            pro["id"].as_str().unwrap()
        ))
        .await;
    assert_eq!(member["data"]["pricingTier"], "member");
    assert_eq!(member["data"]["priceCents"], 6000);

    // A signup that never paid is not a member yet
    fixture
        .post(
            "/api/members/signup",
            json!({"firstName": "Sam", "lastName": "Cole", "email": "unpaid@example.com", "role": "student"}),
        )
        .await;
    let (_, unpaid) = fixture
        .get(&format!("/api/events/{}/quote?email=unpaid@example.com", event_id))
        .await;
    assert_eq!(unpaid["data"]["pricingTier"], "non_member");
}

#[tokio::test]
async fn test_member_id_of_someone_else_gets_no_discount() {
    let fixture = TestFixture::new().await;
    let event = fixture
        .create_event(json!({"nonMemberPriceCents": 20000, "memberPriceCents": 5000, "capacity": 10}))
        .await;
    let event_id = event["id"].as_str().unwrap();
    let pro = fixture.active_member("pro@example.com", "professional").await;
    let pro_id = pro["id"].as_str().unwrap();

    let (_, quote) = fixture
        .get(&format!(
            "/api/events/{}/quote?memberId={}&email=stranger@example.com",
            event_id, pro_id
        ))
        .await;
    assert_eq!(quote["data"]["pricingTier"], "non_member");
    assert_eq!(quote["data"]["priceCents"], 20000);

    let (status, body) = fixture
        .post(
            &format!("/api/events/{}/registrations", event_id),
            json!({"name": "Stranger", "email": "stranger@example.com", "memberId": pro_id}),
        )
        .await;
    assert_eq!(status, 200, "{}", body);
    let registration = &body["data"]["registration"];
    assert_eq!(registration["pricingTier"], "non_member");
    assert_eq!(registration["priceCents"], 20000);
    assert!(registration["memberId"].is_null());
    assert_eq!(body["data"]["payment"]["amountCents"], 20000);

    let (status, body) = fixture
        .post(
            &format!("/api/events/{}/registrations", event_id),
            json!({"name": "Pat Lee", "email": "PRO@example.com", "memberId": pro_id}),
        )
        .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["data"]["registration"]["pricingTier"], "member");
    assert_eq!(body["data"]["registration"]["priceCents"], 5000);
}

#[tokio::test]
async fn test_event_update_clears_fields_sent_as_null() {
    let fixture = TestFixture::new().await;
    let event = fixture
        .create_event(json!({"capacity": 10, "nonMemberPriceCents": 5000, "memberPriceCents": 2500}))
        .await;
    let id = event["id"].as_str().unwrap().to_string();
    assert_eq!(event["spotsRemaining"], 10);

    let (status, _) = fixture
        .put(&format!("/api/admin/events/{}", id), json!({"title": "Renamed"}))
        .await;
    assert_eq!(status, 200);
    let (_, kept) = fixture.get(&format!("/api/events/{}", id)).await;
    assert_eq!(kept["data"]["capacity"], 10);
    assert_eq!(kept["data"]["memberPriceCents"], 2500);

    let (status, body) = fixture
        .put(
            &format!("/api/admin/events/{}", id),
            json!({"capacity": null, "memberPriceCents": null}),
        )
        .await;
    assert_eq!(status, 200, "{}", body);
    assert!(body["data"]["capacity"].is_null());
    assert!(body["data"]["memberPriceCents"].is_null());
    assert!(body["data"]["spotsRemaining"].is_null());
    assert_eq!(body["data"]["title"], "Renamed");

    let (_, stored) = fixture.get(&format!("/api/events/{}", id)).await;
    assert!(stored["data"]["capacity"].is_null());
    assert!(stored["data"]["memberPriceCents"].is_null());
}

#[tokio::test]
async fn test_event_pricing_validation() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .post(
            "/api/admin/events",
            json!({
                "title": "Workshop",
                "location": "Online",
                "startsAt": Utc::now().to_rfc3339(),
                "nonMemberPriceCents": 5000,
                "tierPrices": [
                    {"role": "student", "priceCents": 1000},
                    {"role": "student", "priceCents": 1500}
                ]
            }),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_free_registration_is_confirmed_and_mailed() {
    let fixture = TestFixture::new().await;
    let event = fixture.create_event(json!({"capacity": 2})).await;
    let event_id = event["id"].as_str().unwrap();

    let (status, body) = fixture
        .post(
            &format!("/api/events/{}/registrations", event_id),
            json!({"name": "Jordan", "email": "jordan@example.com"}),
        )
        .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["data"]["registration"]["status"], "confirmed");
    assert!(body["data"]["payment"].is_null());
    assert_eq!(
        fixture.mailer.subjects(),
        vec!["You're registered: Spring Conference".to_string()]
    );

    // Same email again, different case
    let (status, dup) = fixture
        .post(
            &format!("/api/events/{}/registrations", event_id),
            json!({"name": "Jordan", "email": "JORDAN@example.com"}),
        )
        .await;
    assert_eq!(status, 409);
    assert_eq!(dup["error"]["code"], "CONFLICT");

    let (status, _) = fixture
        .post(
            &format!("/api/events/{}/registrations", event_id),
            json!({"name": "Casey", "email": "casey@example.com"}),
        )
        .await;
    assert_eq!(status, 200);

    let (status, full) = fixture
        .post(
            &format!("/api/events/{}/registrations", event_id),
            json!({"name": "Alex", "email": "alex@example.com"}),
        )
        .await;
    assert_eq!(status, 409);
    assert_eq!(full["error"]["code"], "EVENT_FULL");

    let (_, public) = fixture.get(&format!("/api/events/{}", event_id)).await;
    assert_eq!(public["data"]["registeredCount"], 2);
    assert_eq!(public["data"]["spotsRemaining"], 0);
}

#[tokio::test]
async fn test_closed_and_past_events_reject_registrations() {
    let fixture = TestFixture::new().await;
    let closed = fixture.create_event(json!({"registrationOpen": false})).await;

    let (status, body) = fixture
        .post(
            &format!("/api/events/{}/registrations", closed["id"].as_str().unwrap()),
            json!({"name": "Jordan", "email": "jordan@example.com"}),
        )
        .await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["code"], "INVALID_STATE");

    let past = fixture
        .create_event(json!({"startsAt": (Utc::now() - chrono::Duration::hours(2)).to_rfc3339()}))
        .await;
    let (status, _) = fixture
        .post(
            &format!("/api/events/{}/registrations", past["id"].as_str().unwrap()),
            json!({"name": "Jordan", "email": "jordan@example.com"}),
        )
        .await;
    assert_eq!(status, 409);

    // Past events only show when asked for
    let (_, upcoming) = fixture.get("/api/events").await;
    assert_eq!(upcoming["data"].as_array().unwrap().len(), 1);
    let (_, all) = fixture.get("/api/events?includePast=true").await;
    assert_eq!(all["data"].as_array().unwrap().len(), 2);

    let (status, _) = fixture
        .post(
            "/api/events/no-such-event/registrations",
            json!({"name": "Jordan", "email": "jordan@example.com"}),
        )
        .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_paid_registration_confirm_flow() {
    let fixture = TestFixture::new().await;
    let event = fixture
        .create_event(json!({"nonMemberPriceCents": 4500, "capacity": 10}))
        .await;
    let event_id = event["id"].as_str().unwrap();

    let (status, body) = fixture
        .post(
            &format!("/api/events/{}/registrations", event_id),
            json!({"name": "Riley", "email": "riley@example.com"}),
        )
        .await;
    assert_eq!(status, 200, "{}", body);
    let registration = &body["data"]["registration"];
    assert_eq!(registration["status"], "pending_payment");
    assert_eq!(registration["pricingTier"], "non_member");
    assert!(registration["holdExpiresAt"].is_string());
    let payment = &body["data"]["payment"];
    assert_eq!(payment["amountCents"], 4500);
    assert!(payment["clientSecret"].as_str().unwrap().ends_with("_secret"));

    let registration_id = registration["id"].as_str().unwrap().to_string();
    let intent_id = payment["paymentIntentId"].as_str().unwrap().to_string();
    assert!(fixture.mailer.subjects().is_empty());

    // Not paid yet
    let (status, body) = fixture
        .post(&format!("/api/registrations/{}/confirm", registration_id), json!({}))
        .await;
    assert_eq!(status, 402);
    assert_eq!(body["error"]["code"], "PAYMENT_REQUIRED");

    fixture.gateway.set_status(&intent_id, IntentStatus::Succeeded);
    let (status, body) = fixture
        .post(&format!("/api/registrations/{}/confirm", registration_id), json!({}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["status"], "confirmed");
    assert!(body["data"]["holdExpiresAt"].is_null());

    // Confirming again changes nothing and mails nothing new
    let (status, _) = fixture
        .post(&format!("/api/registrations/{}/confirm", registration_id), json!({}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(fixture.mailer.subjects().len(), 1);

    // Attendee report
    let (_, report) = fixture
        .get(&format!("/api/admin/events/{}/registrations", event_id))
        .await;
    assert_eq!(report["data"]["totals"]["confirmed"], 1);
    assert_eq!(report["data"]["totals"]["revenueCents"], 4500);

    // Check-in, then a second check-in is an invalid transition
    let (status, checked_in) = fixture
        .post(
            &format!("/api/admin/registrations/{}/check-in", registration_id),
            json!({}),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(checked_in["data"]["status"], "attended");
    let (status, body) = fixture
        .post(
            &format!("/api/admin/registrations/{}/check-in", registration_id),
            json!({}),
        )
        .await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["code"], "INVALID_STATE");
}

#[tokio::test]
async fn test_failed_payment_setup_releases_seat() {
    let fixture = TestFixture::new().await;
    let event = fixture
        .create_event(json!({"nonMemberPriceCents": 4500, "capacity": 1}))
        .await;
    let event_id = event["id"].as_str().unwrap();

    fixture.gateway.fail_creates.store(true, Ordering::SeqCst);
    let (status, body) = fixture
        .post(
            &format!("/api/events/{}/registrations", event_id),
            json!({"name": "Riley", "email": "riley@example.com"}),
        )
        .await;
    assert_eq!(status, 502);
    assert_eq!(body["error"]["code"], "PAYMENT_ERROR");

    fixture.gateway.fail_creates.store(false, Ordering::SeqCst);
    let (status, _) = fixture
        .post(
            &format!("/api/events/{}/registrations", event_id),
            json!({"name": "Riley", "email": "riley@example.com"}),
        )
        .await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_public_cancel_requires_matching_email() {
    let fixture = TestFixture::new().await;
    let event = fixture.create_event(json!({"capacity": 1})).await;
    let event_id = event["id"].as_str().unwrap();

    let (_, body) = fixture
        .post(
            &format!("/api/events/{}/registrations", event_id),
            json!({"name": "Jordan", "email": "jordan@example.com"}),
        )
        .await;
    let registration_id = body["data"]["registration"]["id"].as_str().unwrap().to_string();

    let (status, _) = fixture
        .post(
            &format!("/api/registrations/{}/cancel", registration_id),
            json!({"email": "someone-else@example.com"}),
        )
        .await;
    assert_eq!(status, 404);

    let (status, cancelled) = fixture
        .post(
            &format!("/api/registrations/{}/cancel", registration_id),
            json!({"email": "Jordan@Example.com"}),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(cancelled["data"]["status"], "cancelled");
    assert!(fixture
        .mailer
        .subjects()
        .contains(&"Registration cancelled: Spring Conference".to_string()));

    // The seat is free again
    let (status, _) = fixture
        .post(
            &format!("/api/events/{}/registrations", event_id),
            json!({"name": "Casey", "email": "casey@example.com"}),
        )
        .await;
    assert_eq!(status, 200);

    // Cancelling twice is an invalid transition
    let (status, _) = fixture
        .post(
            &format!("/api/admin/registrations/{}/cancel", registration_id),
            json!({}),
        )
        .await;
    assert_eq!(status, 409);
}

#[tokio::test]
async fn test_sweeper_releases_stale_holds() {
    let fixture = TestFixture::new().await;
    let event = fixture
        .create_event(json!({"nonMemberPriceCents": 4500, "capacity": 1}))
        .await;
    let event_id = event["id"].as_str().unwrap();

    let (_, body) = fixture
        .post(
            &format!("/api/events/{}/registrations", event_id),
            json!({"name": "Riley", "email": "riley@example.com"}),
        )
        .await;
    let registration_id = body["data"]["registration"]["id"].as_str().unwrap().to_string();

    let report = tasks::sweep(&fixture.state, Utc::now()).await.unwrap();
    assert_eq!(report.released_holds, 0);

    let later = Utc::now() + chrono::Duration::minutes(31);
    let report = tasks::sweep(&fixture.state, later).await.unwrap();
    assert_eq!(report.released_holds, 1);

    let registration = fixture
        .state
        .repo
        .get_registration(&registration_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(registration.status.as_str(), "cancelled");

    let (status, _) = fixture
        .post(
            &format!("/api/events/{}/registrations", event_id),
            json!({"name": "Casey", "email": "casey@example.com"}),
        )
        .await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_membership_signup_confirm_and_lookup() {
    let fixture = TestFixture::new().await;

    let (status, dues) = fixture.get("/api/membership/dues").await;
    assert_eq!(status, 200);
    assert_eq!(dues["data"][0]["role"], "professional");
    assert_eq!(dues["data"][0]["amountCents"], 7500);

    let (status, body) = fixture
        .post(
            "/api/members/signup",
            json!({
                "firstName": " Morgan ",
                "lastName": "Hale",
                "email": "morgan@example.com",
                "role": "paraprofessional",
                "credential": "RBT"
            }),
        )
        .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["data"]["member"]["status"], "pending_payment");
    assert_eq!(body["data"]["member"]["firstName"], "Morgan");
    assert_eq!(body["data"]["payment"]["amountCents"], 4500);
    let member_id = body["data"]["member"]["id"].as_str().unwrap().to_string();
    let intent_id = body["data"]["payment"]["paymentIntentId"]
        .as_str()
        .unwrap()
        .to_string();

    let (status, dup) = fixture
        .post(
            "/api/members/signup",
            json!({"firstName": "M", "lastName": "H", "email": "MORGAN@example.com", "role": "student"}),
        )
        .await;
    assert_eq!(status, 409);
    assert_eq!(dup["error"]["code"], "CONFLICT");

    let (status, _) = fixture
        .post(
            &format!("/api/members/{}/confirm", member_id),
            json!({"paymentIntentId": intent_id}),
        )
        .await;
    assert_eq!(status, 402);

    fixture.gateway.set_status(&intent_id, IntentStatus::Succeeded);
    let (status, active) = fixture
        .post(
            &format!("/api/members/{}/confirm", member_id),
            json!({"paymentIntentId": intent_id}),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(active["data"]["status"], "active");
    let expires = active["data"]["membershipExpiresAt"].as_str().unwrap().to_string();
    assert_eq!(fixture.mailer.subjects(), vec!["Welcome to ArkABA".to_string()]);

    // Replaying the confirmation does not extend the term twice
    let (_, again) = fixture
        .post(
            &format!("/api/members/{}/confirm", member_id),
            json!({"paymentIntentId": intent_id}),
        )
        .await;
    assert_eq!(again["data"]["membershipExpiresAt"], expires);
    assert_eq!(fixture.mailer.subjects().len(), 1);

    let (status, lookup) = fixture.get("/api/members/lookup?email=morgan@example.com").await;
    assert_eq!(status, 200);
    assert_eq!(lookup["data"]["status"], "active");
    assert_eq!(lookup["data"]["role"], "paraprofessional");
    assert!(lookup["data"]["email"].is_null());
    assert!(lookup["data"]["id"].is_null());

    let (status, _) = fixture.get("/api/members/lookup?email=nobody@example.com").await;
    assert_eq!(status, 404);

    let (_, active_only) = fixture.get("/api/admin/members?status=active").await;
    assert_eq!(active_only["data"].as_array().unwrap().len(), 1);
    let (_, pending_only) = fixture.get("/api/admin/members?status=pending_payment").await;
    assert_eq!(pending_only["data"], json!([]));
}

#[tokio::test]
async fn test_renewal_extends_from_current_expiry() {
    let fixture = TestFixture::new().await;
    let member = fixture.active_member("renew@example.com", "affiliate").await;
    let member_id = member["id"].as_str().unwrap();
    let first_expiry: chrono::DateTime<Utc> =
        member["membershipExpiresAt"].as_str().unwrap().parse().unwrap();

    let (status, checkout) = fixture
        .post(&format!("/api/members/{}/renew", member_id), json!({}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(checkout["data"]["payment"]["amountCents"], 5000);
    let intent_id = checkout["data"]["payment"]["paymentIntentId"]
        .as_str()
        .unwrap()
        .to_string();

    // An intent for someone else is refused
    let other = fixture.active_member("other@example.com", "student").await;
    let (status, _) = fixture
        .post(
            &format!("/api/members/{}/confirm", other["id"].as_str().unwrap()),
            json!({"paymentIntentId": intent_id}),
        )
        .await;
    assert_eq!(status, 400);

    fixture.gateway.set_status(&intent_id, IntentStatus::Succeeded);
    let (_, renewed) = fixture
        .post(
            &format!("/api/members/{}/confirm", member_id),
            json!({"paymentIntentId": intent_id}),
        )
        .await;
    let second_expiry: chrono::DateTime<Utc> =
        renewed["data"]["membershipExpiresAt"].as_str().unwrap().parse().unwrap();
    assert_eq!(second_expiry - first_expiry, chrono::Duration::days(365));
}

#[tokio::test]
async fn test_webhook_applies_payment_once() {
    let fixture = TestFixture::new().await;
    let (_, body) = fixture
        .post(
            "/api/members/signup",
            json!({"firstName": "Avery", "lastName": "Cruz", "email": "avery@example.com", "role": "student"}),
        )
        .await;
    let member_id = body["data"]["member"]["id"].as_str().unwrap().to_string();
    let intent_id = body["data"]["payment"]["paymentIntentId"]
        .as_str()
        .unwrap()
        .to_string();

    fixture.gateway.set_status(&intent_id, IntentStatus::Succeeded);
    let payload = serde_json::to_vec(&json!({
        "id": "evt_1",
        "type": "payment_intent.succeeded",
        "data": {"object": fixture.gateway.get(&intent_id)}
    }))
    .unwrap();

    // Bad signature
    let resp = fixture
        .client
        .post(fixture.url("/api/webhooks/stripe"))
        .header("stripe-signature", "t=1,v1=00")
        .body(payload.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    for _ in 0..2 {
        let header = signature_header(&payload, WEBHOOK_SECRET, Utc::now().timestamp());
        let resp = fixture
            .client
            .post(fixture.url("/api/webhooks/stripe"))
            .header("stripe-signature", header)
            .body(payload.clone())
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let ack: Value = resp.json().await.unwrap();
        assert_eq!(ack["data"]["eventId"], "evt_1");
        assert_eq!(ack["data"]["handled"], true);
    }

    let member = fixture.state.repo.get_member(&member_id).await.unwrap().unwrap();
    assert_eq!(member.status.as_str(), "active");
    assert_eq!(fixture.mailer.subjects(), vec!["Welcome to ArkABA".to_string()]);

    // Other event types are acknowledged and ignored
    let other = br#"{"id":"evt_2","type":"charge.refunded","data":{"object":{}}}"#;
    let header = signature_header(other, WEBHOOK_SECRET, Utc::now().timestamp());
    let resp = fixture
        .client
        .post(fixture.url("/api/webhooks/stripe"))
        .header("stripe-signature", header)
        .body(other.to_vec())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let ack: Value = resp.json().await.unwrap();
    assert_eq!(ack["data"]["handled"], false);
}

#[tokio::test]
async fn test_webhook_matches_registration_by_intent_id() {
    let fixture = TestFixture::new().await;
    let event = fixture
        .create_event(json!({"nonMemberPriceCents": 3000}))
        .await;

    let (_, body) = fixture
        .post(
            &format!("/api/events/{}/registrations", event["id"].as_str().unwrap()),
            json!({"name": "Riley", "email": "riley@example.com"}),
        )
        .await;
    let registration_id = body["data"]["registration"]["id"].as_str().unwrap().to_string();
    let intent_id = body["data"]["payment"]["paymentIntentId"]
        .as_str()
        .unwrap()
        .to_string();

    fixture.gateway.set_status(&intent_id, IntentStatus::Succeeded);
    let mut intent = fixture.gateway.get(&intent_id);
    intent.metadata.clear();
    let payload = serde_json::to_vec(&json!({
        "id": "evt_3",
        "type": "payment_intent.succeeded",
        "data": {"object": intent}
    }))
    .unwrap();

    let header = signature_header(&payload, WEBHOOK_SECRET, Utc::now().timestamp());
    let resp = fixture
        .client
        .post(fixture.url("/api/webhooks/stripe"))
        .header("stripe-signature", header)
        .body(payload)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let ack: Value = resp.json().await.unwrap();
    assert_eq!(ack["data"]["handled"], true);

    let registration = fixture
        .state
        .repo
        .get_registration(&registration_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(registration.status.as_str(), "confirmed");
}

#[tokio::test]
async fn test_webhook_without_secret_is_unavailable() {
    let fixture = TestFixture::with_config(|config| config.stripe.webhook_secret = None).await;

    let resp = fixture
        .client
        .post(fixture.url("/api/webhooks/stripe"))
        .header("stripe-signature", "t=1,v1=00")
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "PAYMENTS_UNAVAILABLE");
}

#[tokio::test]
async fn test_chat_forum_flow() {
    let fixture = TestFixture::new().await;
    let member = fixture.active_member("chatter@example.com", "professional").await;
    let member_id = member["id"].as_str().unwrap();

    // Pending members cannot post
    let (_, pending) = fixture
        .post(
            "/api/members/signup",
            json!({"firstName": "New", "lastName": "Person", "email": "new@example.com", "role": "student"}),
        )
        .await;
    let (status, body) = fixture
        .post(
            "/api/chat/messages",
            json!({"memberId": pending["data"]["member"]["id"], "content": "hello"}),
        )
        .await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["code"], "INVALID_STATE");

    let (status, _) = fixture
        .post(
            "/api/chat/messages",
            json!({"memberId": member_id, "content": "   "}),
        )
        .await;
    assert_eq!(status, 400);

    let mut ids = Vec::new();
    for i in 0..3 {
        let (status, body) = fixture
            .post(
                "/api/chat/messages",
                json!({"memberId": member_id, "content": format!("post {}", i)}),
            )
            .await;
        assert_eq!(status, 200);
        assert_eq!(body["data"]["authorName"], "Pat Lee");
        ids.push(body["data"]["id"].as_str().unwrap().to_string());
        // Distinct millisecond timestamps keep the newest-first order stable
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let (_, comment) = fixture
        .post(
            "/api/chat/messages",
            json!({"memberId": member_id, "content": "reply", "parentId": ids[0]}),
        )
        .await;
    let comment_id = comment["data"]["id"].as_str().unwrap().to_string();

    // Comments do not nest
    let (status, _) = fixture
        .post(
            "/api/chat/messages",
            json!({"memberId": member_id, "content": "deeper", "parentId": comment_id}),
        )
        .await;
    assert_eq!(status, 400);

    let (_, first) = fixture.get("/api/chat/messages?limit=2").await;
    let items = first["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["id"], ids[2].as_str());
    let cursor = first["data"]["nextCursor"].as_str().unwrap().to_string();

    let (_, second) = fixture
        .get(&format!("/api/chat/messages?limit=2&cursor={}", cursor))
        .await;
    let items = second["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], ids[0].as_str());
    assert_eq!(items[0]["commentCount"], 1);
    assert!(second["data"]["nextCursor"].is_null());

    let (status, body) = fixture.get("/api/chat/messages?cursor=not-a-cursor").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (_, comments) = fixture
        .get(&format!("/api/chat/messages/{}/comments", ids[0]))
        .await;
    assert_eq!(comments["data"]["items"][0]["content"], "reply");

    // Moderation is admin-only
    let resp = Client::new()
        .delete(fixture.url(&format!("/api/admin/chat/messages/{}", ids[0])))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let (status, _) = fixture
        .delete(&format!("/api/admin/chat/messages/{}", ids[0]))
        .await;
    assert_eq!(status, 200);
    let (status, _) = fixture
        .get(&format!("/api/chat/messages/{}/comments", ids[0]))
        .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_chat_stream_delivers_new_messages() {
    let fixture = TestFixture::new().await;
    let member = fixture.active_member("live@example.com", "professional").await;

    let mut stream = fixture
        .client
        .get(fixture.url("/api/chat/stream"))
        .send()
        .await
        .unwrap();
    assert_eq!(stream.status(), 200);
    assert!(stream.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    fixture
        .post(
            "/api/chat/messages",
            json!({"memberId": member["id"], "content": "live hello"}),
        )
        .await;

    let received = tokio::time::timeout(Duration::from_secs(5), async {
        let mut buffer = String::new();
        while let Some(chunk) = stream.chunk().await.unwrap() {
            buffer.push_str(&String::from_utf8_lossy(&chunk));
            if buffer.contains("live hello") {
                break;
            }
        }
        buffer
    })
    .await
    .expect("no chat event within timeout");

    assert!(received.contains("event: message.created"));
    assert!(received.contains("\"type\":\"message.created\""));
}

#[tokio::test]
async fn test_contact_form_forwards_to_admin() {
    let fixture = TestFixture::new().await;

    let (status, _) = fixture
        .post(
            "/api/contact",
            json!({"name": "Sam", "email": "sam@example.com", "subject": "Sponsorship", "message": "How can we sponsor?"}),
        )
        .await;
    assert_eq!(status, 200);
    {
        let sent = fixture.mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "admin@arkaba.org");
        assert_eq!(sent[0].reply_to.as_deref(), Some("sam@example.com"));
    }

    let (status, _) = fixture
        .post(
            "/api/contact",
            json!({"name": "Sam", "email": "not-an-email", "message": "Hi"}),
        )
        .await;
    assert_eq!(status, 400);

    fixture.mailer.fail.store(true, Ordering::SeqCst);
    let (status, body) = fixture
        .post(
            "/api/contact",
            json!({"name": "Sam", "email": "sam@example.com", "message": "Hi again"}),
        )
        .await;
    assert_eq!(status, 502);
    assert_eq!(body["error"]["code"], "MAIL_ERROR");
}

#[tokio::test]
async fn test_mail_failure_does_not_fail_registration() {
    let fixture = TestFixture::new().await;
    let event = fixture.create_event(json!({})).await;
    fixture.mailer.fail.store(true, Ordering::SeqCst);

    let (status, body) = fixture
        .post(
            &format!("/api/events/{}/registrations", event["id"].as_str().unwrap()),
            json!({"name": "Jordan", "email": "jordan@example.com"}),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["registration"]["status"], "confirmed");
}

#[tokio::test]
async fn test_dashboard_and_revision() {
    let fixture = TestFixture::new().await;

    let (_, before) = fixture.get("/api/revision").await;
    let start = before["data"]["revisionId"].as_i64().unwrap();

    fixture
        .post(
            "/api/admin/blogs",
            json!({"title": "Published", "author": "Board", "content": "x", "published": true}),
        )
        .await;
    fixture
        .post(
            "/api/admin/blogs",
            json!({"title": "Draft", "author": "Board", "content": "x"}),
        )
        .await;
    let event = fixture.create_event(json!({})).await;
    fixture
        .post(
            &format!("/api/events/{}/registrations", event["id"].as_str().unwrap()),
            json!({"name": "Jordan", "email": "jordan@example.com"}),
        )
        .await;
    fixture.active_member("dash@example.com", "student").await;

    let (status, dash) = fixture.get("/api/admin/dashboard").await;
    assert_eq!(status, 200);
    let data = &dash["data"];
    assert_eq!(data["publishedBlogs"], 1);
    assert_eq!(data["draftBlogs"], 1);
    assert_eq!(data["upcomingEvents"], 1);
    assert_eq!(data["liveRegistrations"], 1);
    assert_eq!(data["members"]["active"], 1);
    assert!(data["revisionId"].as_i64().unwrap() > start);
    assert_eq!(dash["revisionId"], data["revisionId"]);
}
