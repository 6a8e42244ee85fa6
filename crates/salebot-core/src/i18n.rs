//! Localized response catalog.
//!
//! Templates use positional `{}` placeholders, filled in order. Anything a
//! language does not define falls back to English, and an unknown key renders
//! as its own name.

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Lang {
    #[default]
    En,
    Cz,
    He,
}

impl Lang {
    /// Accepts bare codes (`he`) as well as POSIX locales (`cs_CZ.UTF-8`).
    pub fn from_locale(raw: &str) -> Self {
        let code = raw
            .trim()
            .split(['_', '.', '-', '@'])
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        match code.as_str() {
            "cz" | "cs" => Lang::Cz,
            "he" | "iw" => Lang::He,
            _ => Lang::En,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Lang::En => "en",
            Lang::Cz => "cz",
            Lang::He => "he",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Welcome,
    Start,
    EnterDescription,
    EnterPrice,
    EnterLocation,
    SendPhotos,
    PhotoReceived,
    Preview,
    SendPhotoOrDone,
    FailedSave,
    PostSavedFailedForward,
    PostSubmitted,
    PostCancelled,
    SendConfirmOrCancel,
    SessionReset,
    PostRejected,
    DefaultRejectReason,
    ModerationPreview,
    ForSale,
    ApprovedPhoto,
    ModerationPhoto,
    Unauthorized,
    DoneButton,
    ApproveButton,
    RejectButton,
}

impl Key {
    pub fn name(self) -> &'static str {
        match self {
            Key::Welcome => "welcome",
            Key::Start => "start",
            Key::EnterDescription => "enter_description",
            Key::EnterPrice => "enter_price",
            Key::EnterLocation => "enter_location",
            Key::SendPhotos => "send_photos",
            Key::PhotoReceived => "photo_received",
            Key::Preview => "preview",
            Key::SendPhotoOrDone => "send_photo_or_done",
            Key::FailedSave => "failed_save",
            Key::PostSavedFailedForward => "post_saved_failed_forward",
            Key::PostSubmitted => "post_submitted",
            Key::PostCancelled => "post_cancelled",
            Key::SendConfirmOrCancel => "send_confirm_or_cancel",
            Key::SessionReset => "session_reset",
            Key::PostRejected => "post_rejected",
            Key::DefaultRejectReason => "default_reject_reason",
            Key::ModerationPreview => "moderation_preview",
            Key::ForSale => "for_sale",
            Key::ApprovedPhoto => "approved_photo",
            Key::ModerationPhoto => "moderation_photo",
            Key::Unauthorized => "unauthorized",
            Key::DoneButton => "done_button",
            Key::ApproveButton => "approve_button",
            Key::RejectButton => "reject_button",
        }
    }
}

/// A response key plus its arguments, rendered late against a language.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub key: Key,
    pub args: Vec<String>,
}

impl Reply {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, value: impl ToString) -> Self {
        self.args.push(value.to_string());
        self
    }

    pub fn render(&self, lang: Lang) -> String {
        let args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        render(lang, self.key, &args)
    }
}

pub fn render(lang: Lang, key: Key, args: &[&str]) -> String {
    match template(lang, key).or_else(|| template(Lang::En, key)) {
        Some(t) => fill(t, args),
        None => key.name().to_string(),
    }
}

/// Labels the moderation preview puts in front of the title, across languages.
pub const TITLE_LABELS: &[&str] = &["Title: ", "Název: ", "כותרת: "];

fn fill(template: &str, args: &[&str]) -> String {
    let extra: usize = args.iter().map(|a| a.len()).sum();
    let mut out = String::with_capacity(template.len() + extra);
    let mut args = args.iter();
    let mut rest = template;
    while let Some(idx) = rest.find("{}") {
        out.push_str(&rest[..idx]);
        if let Some(a) = args.next() {
            out.push_str(a);
        }
        rest = &rest[idx + 2..];
    }
    out.push_str(rest);
    out
}

fn template(lang: Lang, key: Key) -> Option<&'static str> {
    match lang {
        Lang::En => en(key),
        Lang::Cz => cz(key),
        Lang::He => he(key),
    }
}

fn en(key: Key) -> Option<&'static str> {
    Some(match key {
        Key::Welcome => "Welcome! Let's create a sale post. Please enter the title:",
        Key::Start => "Send /start to begin creating a sale post.",
        Key::EnterDescription => "Enter a description:",
        Key::EnterPrice => "Enter the price:",
        Key::EnterLocation => "Enter the location:",
        Key::SendPhotos => "Send one or more photos (type 'done' when finished):",
        Key::PhotoReceived => "Photo received. Send another or type 'done'.",
        Key::Preview => "Preview:\nTitle: {}\nDescription: {}\nPrice: {}\nLocation: {}\nPhotos: {}\nSend 'confirm' to submit or 'cancel' to abort.",
        Key::SendPhotoOrDone => "Send a photo or type 'done' when finished.",
        Key::FailedSave => "Failed to save post. Please try again.",
        Key::PostSavedFailedForward => "Post saved, but failed to forward to moderation group.",
        Key::PostSubmitted => "Post submitted for moderation!",
        Key::PostCancelled => "Post creation cancelled.",
        Key::SendConfirmOrCancel => "Send 'confirm' to submit or 'cancel' to abort.",
        Key::SessionReset => "Session reset. Send /start to begin.",
        Key::PostRejected => "Your post was rejected: {}",
        Key::DefaultRejectReason => "Rejected by admin",
        Key::ModerationPreview => "New Sale Post {}\nTitle: {}\nDescription: {}\nPrice: {}\nLocation: {}\nPhotos: {}\nStatus: pending",
        Key::ForSale => "<b>For sale: {}</b>\n\n{}\n\nPrice: {}\nLocation: {}\nPosted by: {}",
        Key::ApprovedPhoto => "Approved post photo",
        Key::ModerationPhoto => "Photo for post {}",
        Key::Unauthorized => "You are not authorized to use this command.",
        Key::DoneButton => "Done",
        Key::ApproveButton => "✅ Approve",
        Key::RejectButton => "❌ Reject",
    })
}

fn cz(key: Key) -> Option<&'static str> {
    Some(match key {
        Key::Welcome => "Vítejte! Pojďme vytvořit prodejní příspěvek. Zadejte prosím název:",
        Key::Start => "Pošlete /start pro zahájení vytváření prodejního příspěvku.",
        Key::EnterDescription => "Zadejte popis:",
        Key::EnterPrice => "Zadejte cenu:",
        Key::EnterLocation => "Zadejte lokalitu:",
        Key::SendPhotos => "Pošlete jednu nebo více fotografií (napište 'done' až skončíte):",
        Key::PhotoReceived => "Fotografie přijata. Pošlete další nebo napište 'done'.",
        Key::Preview => "Náhled:\nNázev: {}\nPopis: {}\nCena: {}\nLokalita: {}\nFotografií: {}\nPošlete 'confirm' pro odeslání nebo 'cancel' pro zrušení.",
        Key::SendPhotoOrDone => "Pošlete fotografii nebo napište 'done' až skončíte.",
        Key::FailedSave => "Nepodařilo se uložit příspěvek. Zkuste to prosím znovu.",
        Key::PostSavedFailedForward => "Příspěvek uložen, ale nepodařilo se jej předat ke schválení.",
        Key::PostSubmitted => "Příspěvek byl odeslán ke schválení!",
        Key::PostCancelled => "Vytváření příspěvku bylo zrušeno.",
        Key::SendConfirmOrCancel => "Pošlete 'confirm' pro odeslání nebo 'cancel' pro zrušení.",
        Key::SessionReset => "Relace byla resetována. Pošlete /start pro zahájení.",
        Key::PostRejected => "Váš příspěvek byl zamítnut: {}",
        Key::DefaultRejectReason => "Zamítnuto administrátorem",
        Key::ModerationPreview => "Nový prodejní příspěvek {}\nNázev: {}\nPopis: {}\nCena: {}\nLokalita: {}\nFotografií: {}\nStav: čeká na schválení",
        Key::ForSale => "<b>Na prodej: {}</b>\n\n{}\n\nCena: {}\nLokalita: {}\nPřidal: {}",
        Key::ApprovedPhoto => "Fotografie schváleného příspěvku",
        Key::ModerationPhoto => "Fotografie k příspěvku {}",
        Key::DoneButton => "Hotovo",
        Key::ApproveButton => "✅ Schválit",
        Key::RejectButton => "❌ Zamítnout",
        Key::Unauthorized => return None,
    })
}

fn he(key: Key) -> Option<&'static str> {
    Some(match key {
        Key::Welcome => "ברוך הבא! בוא ניצור פוסט מכירה. אנא הכנס כותרת:",
        Key::Start => "שלח /start כדי להתחיל ליצור פוסט מכירה.",
        Key::EnterDescription => "הכנס תיאור:",
        Key::EnterPrice => "הכנס מחיר:",
        Key::EnterLocation => "הכנס מיקום:",
        Key::SendPhotos => "שלח תמונה אחת או יותר (כתוב 'done' כשתסיים):",
        Key::PhotoReceived => "התמונה התקבלה. שלח עוד או כתוב 'done'.",
        Key::Preview => "תצוגה מקדימה:\nכותרת: {}\nתיאור: {}\nמחיר: {}\nמיקום: {}\nמספר תמונות: {}\nשלח 'confirm' לאישור או 'cancel' לביטול.",
        Key::SendPhotoOrDone => "שלח תמונה או כתוב 'done' כשתסיים.",
        Key::FailedSave => "שמירת הפוסט נכשלה. נסה שוב.",
        Key::PostSavedFailedForward => "הפוסט נשמר, אך לא נשלח לקבוצת המנהלים.",
        Key::PostSubmitted => "הפוסט נשלח לאישור!",
        Key::PostCancelled => "יצירת הפוסט בוטלה.",
        Key::SendConfirmOrCancel => "שלח 'confirm' לאישור או 'cancel' לביטול.",
        Key::SessionReset => "הסשן אופס. שלח /start כדי להתחיל.",
        Key::PostRejected => "הפוסט שלך נדחה: {}",
        Key::DefaultRejectReason => "נדחה על ידי מנהל",
        Key::ModerationPreview => "פוסט מכירה חדש {}\nכותרת: {}\nתיאור: {}\nמחיר: {}\nמיקום: {}\nתמונות: {}\nסטטוס: ממתין",
        Key::ForSale => "<b>למכירה: {}</b>\n\n{}\n\nמחיר: {}\nמיקום: {}\nפורסם על ידי: {}",
        Key::ApprovedPhoto => "תמונה של פוסט שאושר",
        Key::ModerationPhoto => "תמונה לפוסט {}",
        Key::DoneButton => "סיום",
        Key::ApproveButton => "✅ אישור",
        Key::RejectButton => "❌ דחייה",
        Key::Unauthorized => return None,
    })
}
