use std::collections::BTreeMap;

use crate::APP_NAME;

pub const INSTANCE_LABEL: &str = "app.kubernetes.io/instance";

pub fn get_release_selector(release_name: &str) -> String {
    format!("{INSTANCE_LABEL}={release_name}")
}

pub fn get_managed_labels(release_name: &str, component: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (INSTANCE_LABEL.to_owned(), release_name.to_owned()),
        ("app.kubernetes.io/component".to_owned(), component.to_owned()),
        ("app.kubernetes.io/managed-by".to_owned(), APP_NAME.to_owned()),
    ])
}
