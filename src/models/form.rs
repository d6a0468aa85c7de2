/// 按提交顺序保存的表单字段，复选框组会重复同名字段
#[derive(Debug, Clone, Default)]
pub struct FormFields {
    fields: Vec<(String, String)>,
}

impl From<Vec<(String, String)>> for FormFields {
    fn from(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }
}

impl FormFields {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.trim())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(key, _)| key == name)
            .map(|(_, value)| value.trim())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(key, _)| key == name)
    }
}

#[cfg(test)]
impl<const N: usize> From<[(&str, &str); N]> for FormFields {
    fn from(fields: [(&str, &str); N]) -> Self {
        Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_names_keep_submission_order() {
        let form = FormFields::from([("column", "3"), ("state", " {} "), ("column", "1")]);
        assert_eq!(form.get_all("column").collect::<Vec<_>>(), ["3", "1"]);
        assert_eq!(form.get("state"), Some("{}"));
        assert!(!form.contains("kind"));
    }

    #[test]
    fn values_outlive_a_built_field_name() {
        let form = FormFields::from([("value_eq", " 5 "), ("value_eq", "6")]);
        let value = {
            let name = format!("value_{}", "eq");
            form.get(&name)
        };
        assert_eq!(value, Some("5"));
    }
}
