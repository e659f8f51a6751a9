//! Outbound message text assembly: `{placeholder}` substitution plus the
//! context builders that turn appointments into renderable values. This
//! layer only formats; it never validates business state.

use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use regex::Regex;
use tracing::warn;

use clinic_cell::Clinic;
use shared_utils::time::zh_weekday;

pub const AUTO_ASSIGNED_REVEAL_TEMPLATE: &str =
    "【{診所名稱}】自動分配通知:{預約日期} {預約時間} {病患姓名} 的{預約項目},將由 {治療師姓名} 提供治療。";

pub const PATIENT_FORM_MESSAGE_TEMPLATE: &str =
    "【{診所名稱}】提醒您,{預約日期} {預約時間} 的{預約項目}需要填寫「{表單名稱}」,請點選下方按鈕完成填寫,謝謝您的配合。";

pub const PATIENT_FORM_BUTTON_LABEL: &str = "填寫表單";

pub const DAILY_DIGEST_HEADER_TEMPLATE: &str = "【{診所名稱}】{預約日期} 預約提醒";

pub const PENDING_REVIEW_TEMPLATE: &str =
    "【{診所名稱}】目前有 {待確認數} 筆預約尚未確認時間,請至後台處理。";

/// Substitute `{token}` placeholders. Longer token names are replaced first
/// so a short token can never match inside a longer one; any token left
/// without a value renders as the empty string. Never fails.
pub fn render_template(template: &str, values: &HashMap<String, String>) -> String {
    let mut keys: Vec<&String> = values.keys().collect();
    keys.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then_with(|| a.cmp(b)));

    let mut rendered = template.to_string();
    for key in keys {
        if let Some(value) = values.get(key.as_str()) {
            rendered = rendered.replace(&format!("{{{}}}", key), value);
        }
    }

    let leftover = Regex::new(r"\{[^{}]+\}").unwrap();
    leftover.replace_all(&rendered, "").into_owned()
}

/// "8月6日 (週四)" — the clinic-facing date format.
pub fn format_clinic_date(date: NaiveDate) -> String {
    format!("{}月{}日 (週{})", date.month(), date.day(), zh_weekday(date))
}

pub fn format_clinic_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Collapse a batch of dates into "first 至 last" (or the single date).
pub fn collapse_date_range(dates: &[NaiveDate]) -> String {
    let mut sorted: Vec<NaiveDate> = dates.to_vec();
    sorted.sort();
    match (sorted.first(), sorted.last()) {
        (Some(first), Some(last)) if first != last => {
            format!("{} 至 {}", format_clinic_date(*first), format_clinic_date(*last))
        }
        (Some(first), _) => format_clinic_date(*first),
        _ => String::new(),
    }
}

/// Renderable values for a single appointment.
pub fn appointment_context(
    clinic: &Clinic,
    patient_name: &str,
    practitioner_name: &str,
    appointment_type_name: &str,
    date: NaiveDate,
    start_time: NaiveTime,
    duration_minutes: Option<i32>,
) -> HashMap<String, String> {
    let mut values = HashMap::new();

    values.insert("診所名稱".to_string(), clinic.name.clone());
    values.insert(
        "診所地址".to_string(),
        clinic.address.clone().unwrap_or_else(|| {
            warn!("Clinic {} has no address configured for message templates", clinic.id);
            String::new()
        }),
    );
    values.insert(
        "診所電話".to_string(),
        clinic.phone.clone().unwrap_or_else(|| {
            warn!("Clinic {} has no phone configured for message templates", clinic.id);
            String::new()
        }),
    );
    values.insert("病患姓名".to_string(), patient_name.to_string());
    values.insert("治療師姓名".to_string(), practitioner_name.to_string());
    values.insert("預約項目".to_string(), appointment_type_name.to_string());
    values.insert("預約日期".to_string(), format_clinic_date(date));
    values.insert("預約星期".to_string(), format!("週{}", zh_weekday(date)));
    values.insert("預約時間".to_string(), format_clinic_time(start_time));

    if let Some(minutes) = duration_minutes {
        let end_time = start_time + Duration::minutes(minutes as i64);
        values.insert("結束時間".to_string(), format_clinic_time(end_time));
    }

    values
}

/// Extends a single-appointment context with the values a recurring-series
/// message needs: the collapsed date range and the visit count.
pub fn recurring_context(
    mut values: HashMap<String, String>,
    dates: &[NaiveDate],
) -> HashMap<String, String> {
    values.insert("預約日期範圍".to_string(), collapse_date_range(dates));
    values.insert("預約次數".to_string(), dates.len().to_string());
    values
}
