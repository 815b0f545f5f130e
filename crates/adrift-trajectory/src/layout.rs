//! Output layout capability interface.
//!
//! The core write algorithm does not care which conventions the output
//! follows; it depends only on [`OutputLayout`]: which variable names are
//! reserved (written as row-key or coordinate rather than as data columns
//! with fill-value attributes), how storage names map to output names, and
//! which documentation attributes each output variable carries.
//!
//! [`CfTrajectoryLayout`] is the stock implementation, following the CF
//! trajectory conventions the surrounding framework emits.

use std::collections::BTreeMap;

use serde_json::json;

use crate::fill::{fill_value, OutputVariables};
use adrift_particles::variable::ElementType;

/// Attribute dictionary of one output variable.
pub type AttrMap = BTreeMap<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// TimeOrigin
// ---------------------------------------------------------------------------

/// Origin and calendar of the simulation's time axis.
///
/// With no epoch, time is written as plain relative seconds. With an epoch,
/// the time variable's units become `"seconds since <epoch>"` and the
/// calendar attribute is attached (`"np_datetime64"` normalizes to the CF
/// name `"standard"`).
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimeOrigin {
    /// Epoch timestamp, e.g. `"2000-01-01T00:00:00"`.
    pub epoch: Option<String>,
    /// Calendar system name.
    pub calendar: Option<String>,
}

impl TimeOrigin {
    /// Units string for the time variable.
    pub fn units(&self) -> String {
        match &self.epoch {
            Some(epoch) => format!("seconds since {epoch}"),
            None => "seconds".to_owned(),
        }
    }

    /// Normalized calendar name, if one is configured.
    pub fn normalized_calendar(&self) -> Option<String> {
        self.calendar.as_deref().map(|c| {
            if c == "np_datetime64" {
                "standard".to_owned()
            } else {
                c.to_owned()
            }
        })
    }
}

// ---------------------------------------------------------------------------
// OutputLayout
// ---------------------------------------------------------------------------

/// Per-output-strategy capabilities consumed by the chunk writer.
pub trait OutputLayout {
    /// Output-variable names handled specially (row key and coordinates);
    /// these never receive descriptor-based fill-value attributes.
    fn reserved_variable_names(&self) -> &[&str];

    /// Map a storage variable name to its output name.
    fn output_name(&self, name: &str) -> String;

    /// Documentation attributes per output variable name.
    fn variable_attributes(
        &self,
        vars: &OutputVariables,
        origin: &TimeOrigin,
    ) -> BTreeMap<String, AttrMap>;
}

// ---------------------------------------------------------------------------
// CfTrajectoryLayout
// ---------------------------------------------------------------------------

/// CF trajectory conventions: rows keyed by `trajectory`, coordinates
/// `time`/`lon`/`lat`/`z`.
#[derive(Debug, Clone, Default)]
pub struct CfTrajectoryLayout;

impl OutputLayout for CfTrajectoryLayout {
    fn reserved_variable_names(&self) -> &[&str] {
        &["trajectory", "time", "lon", "lat", "z"]
    }

    fn output_name(&self, name: &str) -> String {
        match name {
            "id" => "trajectory".to_owned(),
            "depth" => "z".to_owned(),
            other => other.to_owned(),
        }
    }

    fn variable_attributes(
        &self,
        vars: &OutputVariables,
        origin: &TimeOrigin,
    ) -> BTreeMap<String, AttrMap> {
        let mut attrs: BTreeMap<String, AttrMap> = BTreeMap::new();

        attrs.insert(
            "z".to_owned(),
            BTreeMap::from([
                ("long_name".to_owned(), json!("")),
                ("standard_name".to_owned(), json!("depth")),
                ("units".to_owned(), json!("m")),
                ("positive".to_owned(), json!("down")),
            ]),
        );
        attrs.insert(
            "trajectory".to_owned(),
            BTreeMap::from([
                ("long_name".to_owned(), json!("Unique identifier for each particle")),
                ("cf_role".to_owned(), json!("trajectory_id")),
                ("_FillValue".to_owned(), fill_value(ElementType::Int64).to_json()),
            ]),
        );
        let mut time_attrs = BTreeMap::from([
            ("long_name".to_owned(), json!("")),
            ("standard_name".to_owned(), json!("time")),
            ("units".to_owned(), json!(origin.units())),
            ("axis".to_owned(), json!("T")),
        ]);
        if let Some(calendar) = origin.normalized_calendar() {
            time_attrs.insert("calendar".to_owned(), json!(calendar));
        }
        attrs.insert("time".to_owned(), time_attrs);
        attrs.insert(
            "lon".to_owned(),
            BTreeMap::from([
                ("long_name".to_owned(), json!("")),
                ("standard_name".to_owned(), json!("longitude")),
                ("units".to_owned(), json!("degrees_east")),
                ("axis".to_owned(), json!("X")),
            ]),
        );
        attrs.insert(
            "lat".to_owned(),
            BTreeMap::from([
                ("long_name".to_owned(), json!("")),
                ("standard_name".to_owned(), json!("latitude")),
                ("units".to_owned(), json!("degrees_north")),
                ("axis".to_owned(), json!("Y")),
            ]),
        );

        for var in vars.iter() {
            let out_name = self.output_name(&var.name);
            if self.reserved_variable_names().contains(&out_name.as_str()) {
                continue;
            }
            attrs.insert(
                out_name.clone(),
                BTreeMap::from([
                    ("_FillValue".to_owned(), fill_value(var.dtype).to_json()),
                    ("long_name".to_owned(), json!("")),
                    ("standard_name".to_owned(), json!(out_name)),
                    ("units".to_owned(), json!("unknown")),
                ]),
            );
        }

        attrs
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
