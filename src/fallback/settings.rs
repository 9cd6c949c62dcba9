use crate::api::settings::{NotificationSettings, Settings};

pub fn settings() -> Settings {
  Settings {
    institution_name: "Demo School".to_string(),
    contact_email: "admin@demo-school.ng".to_string(),
    timezone: "Africa/Lagos".to_string(),
    currency: "NGN".to_string(),
    default_exam_minutes: 60,
    pass_mark: 50,
    allow_self_registration: false,
    notifications: NotificationSettings {
      email: true,
      sms: false,
    },
  }
}
