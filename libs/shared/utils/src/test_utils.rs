use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub line_api_base_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            line_api_base_url: "http://localhost:54322".to_string(),
        }
    }
}

impl TestConfig {
    /// Config pointing both the database and the LINE API at one mock server.
    pub fn with_mock_server(uri: &str) -> Self {
        Self {
            supabase_url: uri.to_string(),
            line_api_base_url: uri.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_service_role_key: "test-service-role-key".to_string(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            line_api_base_url: self.line_api_base_url.clone(),
            public_form_base_url: "https://forms.example.com".to_string(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "staff@example.com".to_string(),
            role: "authenticated".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, jwt_secret: &str, expires_in_hours: Option<i64>) -> String {
        let header = json!({"alg": "HS256", "typ": "JWT"});
        let now = Utc::now();
        let exp = now + Duration::hours(expires_in_hours.unwrap_or(1));
        let claims = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp(),
        });

        let header_b64 = URL_SAFE_NO_PAD.encode(header.to_string());
        let claims_b64 = URL_SAFE_NO_PAD.encode(claims.to_string());
        let signing_input = format!("{}.{}", header_b64, claims_b64);

        let mut mac = Hmac::<Sha256>::new_from_slice(jwt_secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(signing_input.as_bytes());
        let signature_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        format!("{}.{}", signing_input, signature_b64)
    }
}

/// Canned PostgREST row shapes for wiremock responses.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn clinic_row(id: Uuid, name: &str, settings: Value) -> Value {
        json!({
            "id": id,
            "name": name,
            "address": "台北市中山區南京東路100號",
            "phone": "02-2345-6789",
            "line_channel_access_token": "test-channel-token",
            "booking_restriction_settings": settings,
            "is_active": true,
            "created_at": "2026-01-01T00:00:00+00:00",
            "updated_at": "2026-01-01T00:00:00+00:00",
        })
    }

    pub fn association_row(
        clinic_id: Uuid,
        user_id: Uuid,
        roles: &[&str],
        line_user_id: Option<&str>,
        settings: Value,
    ) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "user_id": user_id,
            "clinic_id": clinic_id,
            "display_name": "王小明",
            "line_user_id": line_user_id,
            "roles": roles,
            "notification_settings": settings,
            "is_active": true,
            "created_at": "2026-01-01T00:00:00+00:00",
            "updated_at": "2026-01-01T00:00:00+00:00",
        })
    }

    /// An appointment joined to its calendar event, patient and type, the
    /// shape the candidate selectors request via PostgREST embedding.
    pub fn appointment_row(
        id: Uuid,
        clinic_id: Uuid,
        practitioner_id: Option<Uuid>,
        date: &str,
        start_time: &str,
    ) -> Value {
        json!({
            "id": id,
            "clinic_id": clinic_id,
            "patient_id": Uuid::new_v4(),
            "appointment_type_id": Uuid::new_v4(),
            "calendar_event_id": Uuid::new_v4(),
            "status": "confirmed",
            "is_auto_assigned": true,
            "pending_time_confirmation": false,
            "originally_auto_assigned": true,
            "note": null,
            "created_at": "2026-01-01T00:00:00+00:00",
            "updated_at": "2026-01-01T00:00:00+00:00",
            "calendar_event": {
                "id": Uuid::new_v4(),
                "clinic_id": clinic_id,
                "practitioner_id": practitioner_id,
                "date": date,
                "start_time": start_time,
                "end_time": "23:59:00",
            },
            "patient": {
                "id": Uuid::new_v4(),
                "name": "陳大文",
                "line_user_id": "U1234567890abcdef",
            },
            "appointment_type": {
                "id": Uuid::new_v4(),
                "name": "徒手治療",
                "duration_minutes": 60,
            },
        })
    }

    pub fn scheduled_message_row(
        id: Uuid,
        clinic_id: Uuid,
        message_type: &str,
        context: Value,
        scheduled_send_time: &str,
        status: &str,
    ) -> Value {
        json!({
            "id": id,
            "clinic_id": clinic_id,
            "message_type": message_type,
            "message_context": context,
            "scheduled_send_time": scheduled_send_time,
            "status": status,
            "error_reason": null,
            "created_at": "2026-01-01T00:00:00+00:00",
            "updated_at": "2026-01-01T00:00:00+00:00",
        })
    }

    pub fn medical_record_row(id: Uuid, clinic_id: Uuid, appointment_id: Uuid, template_id: Uuid) -> Value {
        json!({
            "id": id,
            "clinic_id": clinic_id,
            "appointment_id": appointment_id,
            "template_id": template_id,
            "created_at": "2026-01-01T00:00:00+00:00",
        })
    }
}
