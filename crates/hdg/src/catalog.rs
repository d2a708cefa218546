//! Built-in data-point catalog.
//!
//! This covers the commonly used nodes of an HDG K-series / Euro controller.
//! A complete catalog for a specific installation can be supplied as a YAML
//! file instead (see [`crate::registry::Catalog`]).

use crate::definition::DataPoint;
use crate::error::HdgResult;
use crate::registry::{GroupDef, Registry};
use crate::setter::{SetterSpec, SetterType};
use crate::value::{Formatter, ValueKind};

pub const GROUP_REALTIME_CORE: &str = "realtime_core";
pub const GROUP_STATUS_GENERAL: &str = "status_general";
pub const GROUP_CONFIG_COUNTERS_1: &str = "config_counters_1";
pub const GROUP_CONFIG_COUNTERS_2: &str = "config_counters_2";
pub const GROUP_CONFIG_COUNTERS_3: &str = "config_counters_3";

/// Default polling groups. The odd offsets keep the long intervals from
/// lining up with each other.
#[must_use]
pub fn default_groups() -> Vec<GroupDef> {
    [
        (GROUP_REALTIME_CORE, 15),
        (GROUP_STATUS_GENERAL, 304),
        (GROUP_CONFIG_COUNTERS_1, 86410),
        (GROUP_CONFIG_COUNTERS_2, 86420),
        (GROUP_CONFIG_COUNTERS_3, 86430),
    ]
    .into_iter()
    .map(|(key, secs)| GroupDef {
        key: key.to_string(),
        default_interval_secs: secs,
    })
    .collect()
}

fn temp(key: &str, node: &str, group: &str) -> DataPoint {
    DataPoint::new(key, node, group, ValueKind::Float).with_unit("°C")
}

fn kelvin(key: &str, node: &str, group: &str) -> DataPoint {
    DataPoint::new(key, node, group, ValueKind::Float).with_unit("K")
}

fn percent(key: &str, node: &str, group: &str) -> DataPoint {
    DataPoint::new(key, node, group, ValueKind::Float).with_unit("%")
}

fn hours(key: &str, node: &str, group: &str) -> DataPoint {
    DataPoint::new(key, node, group, ValueKind::Float)
        .with_formatter(Formatter::Hours)
        .with_unit("h")
}

fn enumeration(key: &str, node: &str, group: &str) -> DataPoint {
    DataPoint::new(key, node, group, ValueKind::EnumText)
}

fn text(key: &str, node: &str, group: &str) -> DataPoint {
    DataPoint::new(key, node, group, ValueKind::Text).with_collapsed_whitespace()
}

const fn setter(setter_type: SetterType, min: f64, max: f64, step: f64) -> SetterSpec {
    SetterSpec {
        setter_type,
        min,
        max,
        step,
    }
}

#[must_use]
#[allow(clippy::too_many_lines)]
pub fn default_points() -> Vec<DataPoint> {
    const CORE: &str = GROUP_REALTIME_CORE;
    const STATUS: &str = GROUP_STATUS_GENERAL;
    const CFG1: &str = GROUP_CONFIG_COUNTERS_1;
    const CFG2: &str = GROUP_CONFIG_COUNTERS_2;
    const CFG3: &str = GROUP_CONFIG_COUNTERS_3;

    vec![
        // realtime core
        temp("aussentemperatur", "20000T", CORE),
        temp("brennraumtemperatur_soll", "22000T", CORE),
        temp("kessel_abgastemperatur_ist", "22001T", CORE),
        percent("kessel_restsauerstoff_ist", "22002T", CORE),
        temp("kesseltemperatur_ist", "22003T", CORE),
        temp("kessel_rucklauftemperatur_ist", "22004T", CORE),
        percent("materialmenge_aktuell", "22005T", CORE),
        percent("primarluftklappe_ist", "22008T", CORE),
        percent("sekundarluftklappe_ist", "22009T", CORE),
        enumeration("kessel_status", "22010T", CORE),
        percent("primarluftklappe_soll", "22019T", CORE),
        temp("kesselvorlauf_solltemperatur", "22022T", CORE),
        temp("kesselrucklauf_solltemperatur", "22023T", CORE),
        percent("kesselleistung_ist", "22024T", CORE),
        percent("kessel_saugzuggeblase_ist", "22030T", CORE),
        DataPoint::new("kessel_unterdruck_ist", "22031T", CORE, ValueKind::Float)
            .with_unit("Pa"),
        temp("puffer_temperatur_oben", "24000T", CORE),
        temp("puffer_temperatur_mitte", "24001T", CORE),
        temp("puffer_temperatur_unten", "24002T", CORE),
        percent("puffer_ladezustand", "24023T", CORE),
        temp("hk1_vorlauftemperatur_ist", "26000T", CORE),
        temp("hk1_vorlauftemperatur_soll", "26099T", CORE),
        temp("hk1_soll_normal", "6022T", CORE)
            .with_setter(setter(SetterType::Int, 0.0, 90.0, 1.0)),
        temp("hk1_soll_absenk", "6023T", CORE)
            .with_setter(setter(SetterType::Int, 0.0, 90.0, 1.0)),
        // general status
        enumeration("kessel_haupt_betriebsart", "22020T", STATUS),
        enumeration("kessel_betriebsphase_text", "22026T", STATUS),
        enumeration("kessel_ausbrandgrund", "22029T", STATUS),
        enumeration("puffer_status", "24015T", STATUS),
        enumeration("hk1_mischer_status_text", "26007T", STATUS),
        enumeration("hk1_pumpe_status_text", "26008T", STATUS),
        enumeration("hk1_aktuelle_betriebsart", "26011T", STATUS),
        kelvin("hk1_parallelverschiebung", "6024T", STATUS)
            .with_setter(setter(SetterType::Int, -20.0, 20.0, 1.0)),
        DataPoint::new("hk1_steilheit", "6026T", STATUS, ValueKind::Float)
            .with_setter(setter(SetterType::Float1, 0.1, 3.5, 0.1)),
        // configuration, part 1
        enumeration("sprache", "1T", CFG1),
        enumeration("bauart", "2T", CFG1),
        enumeration("brennstoff", "6T", CFG1),
        enumeration("holzart", "13T", CFG1),
        enumeration("holzfeuchte", "14T", CFG1),
        percent("minimale_nachlegemenge", "18T", CFG1),
        DataPoint::new("nachlegeschritt", "19T", CFG1, ValueKind::Percent),
        temp("offset_aussenfuhler", "36T", CFG1),
        temp("kesseltemperatur_sollwert_param", "2113T", CFG1),
        DataPoint::new("anzunden_zeitdauer", "2302T", CFG1, ValueKind::Float)
            .with_formatter(Formatter::Minutes)
            .with_unit("min"),
        // configuration, part 2
        temp("freigabe_kesseltemperatur", "2901T", CFG2),
        text("puffer_1_bezeichnung", "4020T", CFG2),
        DataPoint::new("puffer_1_grosse", "4065T", CFG2, ValueKind::Float)
            .with_formatter(Formatter::Liters)
            .with_unit("L"),
        enumeration("hk1_system", "6020T", CFG2),
        text("hk1_bezeichnung", "6021T", CFG2),
        temp("hk1_vorlauftemperatur_minimum", "6027T", CFG2),
        temp("hk1_vorlauftemperatur_maximum", "6028T", CFG2),
        temp("hk1_pumpe_aus_aussentemperatur", "6047T", CFG2)
            .with_setter(setter(SetterType::Int, 0.0, 50.0, 1.0)),
        temp("hk1_eco_absenken_aus_aussentemperatur", "6049T", CFG2)
            .with_setter(setter(SetterType::Int, -10.0, 40.0, 1.0)),
        temp("hk1_heizgrenze_sommer", "6050T", CFG2),
        temp("hk1_heizgrenze_winter", "6051T", CFG2),
        // configuration, part 3
        DataPoint::new("software_version_touch", "20003T", CFG3, ValueKind::Text),
        text("anlagenbezeichnung_sn", "20026T", CFG3),
        DataPoint::new("mac_adresse", "20031T", CFG3, ValueKind::Text),
        enumeration("anlage_betriebsart", "20032T", CFG3),
        DataPoint::new("extra_version_info", "20037T", CFG3, ValueKind::AllowEmpty),
        hours("kessel_betriebsstunden", "22011T", CFG3),
        hours("laufzeit_wt_reinigung", "22012T", CFG3),
        hours("laufzeit_entaschung", "22013T", CFG3),
        hours("kessel_restlaufzeit_wartung", "22025T", CFG3),
        percent("kessel_wirkungsgrad", "22028T", CFG3),
        DataPoint::new("kessel_nachlegezeitpunkt_2", "22053T", CFG3, ValueKind::DateTimeOrText),
        DataPoint::new("kessel_warmemenge_gesamt", "22069T", CFG3, ValueKind::Float)
            .with_formatter(Formatter::MegaWattHours)
            .with_unit("MWh"),
        DataPoint::new("puffer_energie_max", "24016T", CFG3, ValueKind::Float)
            .with_formatter(Formatter::KiloWattHours)
            .with_unit("kWh"),
    ]
}

pub fn default_registry() -> HdgResult<Registry> {
    Registry::new(default_groups(), default_points())
}
