//! Structured bilingual alert templates.
//!
//! A template is a variant tag plus typed fields.  Text lives in a
//! per-language table of segments; the only substitutions are the
//! apartment number and the device host, so no caller-provided string is
//! ever interpreted as a format directive.
//!
//! Delivered bodies carry the Arabic text, a blank line, then English.

use core::fmt::Write as _;

use crate::topology::ApartmentId;

pub type HostName = heapless::String<48>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Arabic,
    English,
}

/// Discriminant of [`MessageTemplate`], for events and routing checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    SystemOnline,
    TheftOwner,
    TheftSameBox,
    TheftAdjacentBox,
    TheftOtherSide,
    SensorWireCut,
    DistributionWireCut,
    StartupSensorWireCut,
    StartupDistributionWireCut,
    ServiceEnabled,
    ServiceDisabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageTemplate {
    /// Greeting to `apartment` with the admin portal host.
    SystemOnline { apartment: ApartmentId, host: HostName },
    /// To the owner of the shaking meter.
    TheftOwner,
    /// `apartment` is the shaking meter, in the recipient's box.
    TheftSameBox { apartment: ApartmentId },
    TheftAdjacentBox { apartment: ApartmentId },
    TheftOtherSide { apartment: ApartmentId },
    SensorWireCut,
    DistributionWireCut,
    StartupSensorWireCut,
    StartupDistributionWireCut,
    ServiceEnabled { apartment: ApartmentId },
    ServiceDisabled { apartment: ApartmentId },
}

#[derive(Debug, Clone, Copy)]
enum Piece {
    Text(&'static str),
    Apartment,
    Host,
}

use Piece::{Apartment, Host, Text};

struct Localized {
    ar: &'static [Piece],
    en: &'static [Piece],
}

const SYSTEM_ONLINE: Localized = Localized {
    ar: &[
        Text("🟢 نظام مكافحة سرقة عداد المياه\n\nمرحباً شقة رقم "),
        Apartment,
        Text("!\nالنظام متصل ويعمل الآن.\n\nلتغيير إعدادات الواي فاي، يجب عليك أولاً الاتصال بشبكة الواي فاي الخاصة بالجهاز ثم زيارة:\nhttp://"),
        Host,
        Text(".local"),
    ],
    en: &[
        Text("🟢 Water Meter Anti-Theft System\n\nHello Apartment "),
        Apartment,
        Text("!\nThe system is now online and working.\n\nTo configure WiFi settings, you must first connect to the device's WiFi network and then visit:\nhttp://"),
        Host,
        Text(".local"),
    ],
};

const THEFT_OWNER: Localized = Localized {
    ar: &[Text("🚨 تنبيه سرقة محتملة!\n\nتم اكتشاف اهتزاز في عداد المياه الخاص بشقتك.\nالرجاء التحقق من العداد فوراً!")],
    en: &[Text("🚨 Potential Theft Alert!\n\nVibration detected in your water meter.\nPlease check your meter immediately!")],
};

const THEFT_SAME_BOX: Localized = Localized {
    ar: &[
        Text("⚠️ تنبيه أمني!\n\nتم اكتشاف اهتزاز محتمل في عداد المياه للشقة رقم "),
        Apartment,
        Text(".\nهذا العداد موجود في نفس الصندوق مع عدادك.\nالرجاء الحذر والمراقبة!"),
    ],
    en: &[
        Text("⚠️ Security Alert!\n\nPotential vibration detected in Apartment "),
        Apartment,
        Text("'s water meter.\nThis meter is in the same box as yours.\nPlease be vigilant!"),
    ],
};

const THEFT_ADJACENT_BOX: Localized = Localized {
    ar: &[
        Text("⚠️ تنبيه أمني!\n\nتم اكتشاف اهتزاز محتمل في عداد المياه للشقة رقم "),
        Apartment,
        Text(".\nهذا العداد موجود في الصندوق المجاور لصندوق عدادك.\nالرجاء الحذر والمراقبة!"),
    ],
    en: &[
        Text("⚠️ Security Alert!\n\nPotential vibration detected in Apartment "),
        Apartment,
        Text("'s water meter.\nThis meter is in the box adjacent to yours.\nPlease be vigilant!"),
    ],
};

const THEFT_OTHER_SIDE: Localized = Localized {
    ar: &[
        Text("ℹ️ إشعار أمني!\n\nتم اكتشاف اهتزاز محتمل في عداد المياه للشقة رقم "),
        Apartment,
        Text(".\nهذا العداد موجود في الجهة الأخرى من المبنى."),
    ],
    en: &[
        Text("ℹ️ Security Notice!\n\nPotential vibration detected in Apartment "),
        Apartment,
        Text("'s water meter.\nThis meter is on the other side of the building."),
    ],
};

const SENSOR_WIRE_CUT: Localized = Localized {
    ar: &[Text("🚨 تنبيه خطر - قطع سلك مستشعر!\n\nتم اكتشاف قطع في أحد أسلاك المستشعرات في صندوق العدادات الخاص بكم.\nلن يتم إخطارك بقطع الأسلاك مرة أخرى حتى يتم إصلاح المشكلة.\nالرجاء الاتصال بالصيانة.")],
    en: &[Text("🚨 Danger Alert - Sensor Wire Cut!\n\nA cut has been detected in one of the sensor cables in your meters box.\nYou won't be notified of wire cuts again until this is fixed.\nPlease contact maintenance.")],
};

const DISTRIBUTION_WIRE_CUT: Localized = Localized {
    ar: &[Text("🔥 تنبيه خطر - قطع سلك رئيسي!\n\nتم اكتشاف قطع في الأسلاك بين لوحة التوزيع ووحدة التحكم في جهتك من المبنى.\nلن يتم إخطارك بقطع الأسلاك مرة أخرى حتى يتم إصلاح المشكلة.\nالرجاء الاتصال بالصيانة فورًا.")],
    en: &[Text("🔥 Danger Alert - Main Wire Cut!\n\nA wire cut has been detected between the distribution box and the control unit in your side of the building.\nYou won't be notified of wire cuts again until this is fixed.\nPlease contact maintenance immediately.")],
};

const STARTUP_SENSOR_WIRE_CUT: Localized = Localized {
    ar: &[Text("🛠️ تنبيه هام!\n\nتمت إعادة تشغيل النظام وتم اكتشاف قطع في أحد أسلاك المستشعرات في صندوق العدادات الخاص بكم.\nلن يتمكن النظام من اكتشاف قطع الأسلاك في صندوق العدادات الخاص بكم حتى يتم إصلاح المشكلة.\nالرجاء الاتصال بالصيانة في أقرب وقت ممكن لإصلاح المشكلة وإعادة تفعيل نظام كشف قطع الأسلاك.")],
    en: &[Text("🛠️ Important Alert!\n\nThe system has rebooted and a cut was detected in one of the sensor wires in your meters box.\nThe system won't be able to detect wire cuts in your meter box until this issue is fixed.\nPlease contact maintenance as soon as possible to fix the issue and reactivate the wire cut detection system.")],
};

const STARTUP_DISTRIBUTION_WIRE_CUT: Localized = Localized {
    ar: &[Text("🛠️ تنبيه هام!\n\nتمت إعادة تشغيل النظام وتم اكتشاف قطع في الأسلاك بين لوحة التوزيع ووحدة التحكم في جهتك من المبنى.\nلن يتمكن النظام من اكتشاف قطع الأسلاك في جهتك حتى يتم إصلاح المشكلة.\nالرجاء الاتصال بالصيانة في أقرب وقت ممكن لإصلاح المشكلة وإعادة تفعيل نظام كشف قطع الأسلاك.")],
    en: &[Text("🛠️ Important Alert!\n\nSystem has rebooted and a wire cut was detected between the distribution box and the control unit in your side of the building.\nThe system won't be able to detect wire cuts in your side until this issue is fixed.\nPlease contact maintenance as soon as possible to fix the issue and reactivate the wire cut detection system.")],
};

const SERVICE_ENABLED: Localized = Localized {
    ar: &[
        Text("🎉 تهانينا!\n\nتم تفعيل خدمة مكافحة سرقة عداد المياه لشقتك رقم "),
        Apartment,
        Text(".\nسيتم إخطارك بأي نشاط مشبوه يتعلق بعدادك."),
    ],
    en: &[
        Text("🎉 Congratulations!\n\nWater Meter Anti-Theft service has been activated for your Apartment "),
        Apartment,
        Text(".\nYou will be notified of any suspicious activity related to your meter."),
    ],
};

const SERVICE_DISABLED: Localized = Localized {
    ar: &[
        Text("⚠️ تنبيه!\n\nتم إيقاف خدمة مكافحة سرقة عداد المياه لشقتك رقم "),
        Apartment,
        Text("."),
    ],
    en: &[
        Text("⚠️ Alert!\n\nWater Meter Anti-Theft service has been deactivated for your Apartment "),
        Apartment,
        Text("."),
    ],
};

impl TemplateKind {
    fn table(self) -> &'static Localized {
        match self {
            Self::SystemOnline => &SYSTEM_ONLINE,
            Self::TheftOwner => &THEFT_OWNER,
            Self::TheftSameBox => &THEFT_SAME_BOX,
            Self::TheftAdjacentBox => &THEFT_ADJACENT_BOX,
            Self::TheftOtherSide => &THEFT_OTHER_SIDE,
            Self::SensorWireCut => &SENSOR_WIRE_CUT,
            Self::DistributionWireCut => &DISTRIBUTION_WIRE_CUT,
            Self::StartupSensorWireCut => &STARTUP_SENSOR_WIRE_CUT,
            Self::StartupDistributionWireCut => &STARTUP_DISTRIBUTION_WIRE_CUT,
            Self::ServiceEnabled => &SERVICE_ENABLED,
            Self::ServiceDisabled => &SERVICE_DISABLED,
        }
    }
}

impl MessageTemplate {
    pub fn kind(&self) -> TemplateKind {
        match self {
            Self::SystemOnline { .. } => TemplateKind::SystemOnline,
            Self::TheftOwner => TemplateKind::TheftOwner,
            Self::TheftSameBox { .. } => TemplateKind::TheftSameBox,
            Self::TheftAdjacentBox { .. } => TemplateKind::TheftAdjacentBox,
            Self::TheftOtherSide { .. } => TemplateKind::TheftOtherSide,
            Self::SensorWireCut => TemplateKind::SensorWireCut,
            Self::DistributionWireCut => TemplateKind::DistributionWireCut,
            Self::StartupSensorWireCut => TemplateKind::StartupSensorWireCut,
            Self::StartupDistributionWireCut => TemplateKind::StartupDistributionWireCut,
            Self::ServiceEnabled { .. } => TemplateKind::ServiceEnabled,
            Self::ServiceDisabled { .. } => TemplateKind::ServiceDisabled,
        }
    }

    fn apartment(&self) -> Option<ApartmentId> {
        match self {
            Self::SystemOnline { apartment, .. }
            | Self::TheftSameBox { apartment }
            | Self::TheftAdjacentBox { apartment }
            | Self::TheftOtherSide { apartment }
            | Self::ServiceEnabled { apartment }
            | Self::ServiceDisabled { apartment } => Some(*apartment),
            _ => None,
        }
    }

    fn host(&self) -> &str {
        match self {
            Self::SystemOnline { host, .. } => host.as_str(),
            _ => "",
        }
    }

    /// Render one language.
    pub fn render(&self, lang: Language) -> String {
        let table = self.kind().table();
        let pieces = match lang {
            Language::Arabic => table.ar,
            Language::English => table.en,
        };
        let mut out = String::new();
        for piece in pieces {
            match piece {
                Text(s) => out.push_str(s),
                Apartment => {
                    if let Some(id) = self.apartment() {
                        let _ = write!(out, "{}", id.get());
                    }
                }
                Host => out.push_str(self.host()),
            }
        }
        out
    }

    /// The delivered body: Arabic, blank line, English.
    pub fn render_bilingual(&self) -> String {
        let mut body = self.render(Language::Arabic);
        body.push_str("\n\n");
        body.push_str(&self.render(Language::English));
        body
    }
}

/// `"<hostname>-Building-<n>"`, truncated to fit.
pub fn host_name(hostname: &str, building: u8) -> HostName {
    let mut host = HostName::new();
    if write!(host, "{hostname}-Building-{building}").is_err() {
        host.clear();
        let _ = write!(host, "mg-Building-{building}");
    }
    host
}
