//! Reply texts and keyboards for each step of the booking flow

use crate::catalog::{Catalog, Insurance, BACK_LABEL, PAY_LABEL};
use crate::state_machine::{Keyboard, Reply};

/// Root menu: one specialty per row
pub fn specialties_keyboard(catalog: &Catalog) -> Keyboard {
    Keyboard::column(catalog.specialties().iter().map(|s| s.name.as_str()))
}

/// Practitioners of `specialty`, then back
pub fn doctors_keyboard(catalog: &Catalog, specialty: &str) -> Keyboard {
    Keyboard::column(
        catalog
            .doctors(specialty)
            .iter()
            .map(String::as_str)
            .chain([BACK_LABEL]),
    )
}

/// The four plans two per row, then back
pub fn insurance_keyboard() -> Keyboard {
    let mut rows: Vec<Vec<String>> = Insurance::ALL
        .chunks(2)
        .map(|pair| pair.iter().map(|p| p.label().to_string()).collect())
        .collect();
    rows.push(vec![BACK_LABEL.to_string()]);
    Keyboard::Menu(rows)
}

pub fn payment_keyboard() -> Keyboard {
    Keyboard::Menu(vec![vec![PAY_LABEL.to_string(), BACK_LABEL.to_string()]])
}

pub fn greeting(catalog: &Catalog) -> Reply {
    Reply::new("سلام\nتخصص مورد نظر را انتخاب کنید:").with_keyboard(specialties_keyboard(catalog))
}

pub fn back_to_menu(catalog: &Catalog) -> Reply {
    Reply::new("بازگشت به منوی اصلی.").with_keyboard(specialties_keyboard(catalog))
}

pub fn fallback(catalog: &Catalog) -> Reply {
    Reply::new("لطفاً یکی از دکمه‌های موجود را انتخاب کنید یا /start را بزنید.")
        .with_keyboard(specialties_keyboard(catalog))
}

pub fn session_lost(catalog: &Catalog) -> Reply {
    Reply::new("اطلاعات جلسه پیدا نشد. لطفاً مجدداً آغاز کنید (/start).")
        .with_keyboard(specialties_keyboard(catalog))
}

pub fn choose_doctor(catalog: &Catalog, specialty: &str) -> Reply {
    Reply::new(format!(
        "شما تخصص {specialty} را انتخاب کردید.\nلطفاً دکتر مورد نظر را انتخاب کنید:"
    ))
    .with_keyboard(doctors_keyboard(catalog, specialty))
}

pub fn doctor_not_listed(catalog: &Catalog, specialty: &str) -> Reply {
    Reply::new("لطفاً یکی از پزشکان را از کیبورد انتخاب کنید.")
        .with_keyboard(doctors_keyboard(catalog, specialty))
}

pub fn ask_name() -> Reply {
    Reply::new("لطفاً نام و نام‌خانوادگی خود را وارد کنید:").with_keyboard(Keyboard::Remove)
}

pub fn ask_national_id() -> Reply {
    Reply::new("لطفاً کد ملی خود را وارد کنید (10 رقم):")
}

pub fn invalid_national_id() -> Reply {
    Reply::new("کد ملی نامعتبر است. لطفاً 10 رقم کد ملی را وارد کنید:")
}

pub fn choose_insurance() -> Reply {
    Reply::new("نوع بیمه خود را انتخاب کنید:").with_keyboard(insurance_keyboard())
}

pub fn insurance_not_listed() -> Reply {
    Reply::new("لطفاً یکی از گزینه‌های بیمه را از کیبورد انتخاب کنید.")
        .with_keyboard(insurance_keyboard())
}

/// Fields shown on the payment summary
pub struct Summary<'a> {
    pub name: &'a str,
    pub national_id: &'a str,
    pub specialty: &'a str,
    pub doctor: &'a str,
    pub insurance: Insurance,
    pub price: u32,
}

pub fn summary(s: &Summary<'_>) -> Reply {
    Reply::new(format!(
        "👤 نام بیمار: {}\n\
         🆔 کد ملی: {}\n\
         🏥 تخصص: {}\n\
         👨‍⚕️ دکتر: {}\n\
         🪪 بیمه: {}\n\
         💰 مبلغ: {} تومان\n\n\
         برای تکمیل و پرداخت روی دکمه پرداخت بزنید یا با بازگشت به صفحه قبل برگردید.",
        s.name,
        s.national_id,
        s.specialty,
        s.doctor,
        s.insurance,
        group_thousands(s.price),
    ))
    .with_keyboard(payment_keyboard())
}

pub fn payment_menu() -> Reply {
    Reply::new("لطفاً از دکمه‌های زیر استفاده کنید.").with_keyboard(payment_keyboard())
}

pub fn payment_confirmed(visit_code: &str) -> Reply {
    Reply::new(format!(
        "✅ پرداخت با موفقیت انجام شد.\nکد مراجعه شما: {visit_code}\n\n\
         لطفاً کد را تا زمان مراجعه نگهدارید.\n\
         برای آغاز یک رزرو دیگر /start را وارد کنید."
    ))
    .with_keyboard(Keyboard::Remove)
}

/// Storage failed; the summary is still valid so the payment menu stays up
pub fn commit_failed() -> Reply {
    Reply::new("خطا در ذخیره‌سازی نوبت. لطفاً بعداً تلاش کنید.").with_keyboard(payment_keyboard())
}

/// `125000` -> `125,000`
pub fn group_thousands(value: u32) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
