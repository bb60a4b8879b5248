/// Role sentinel that asks the backend for the generic, ungrounded model.
pub const BASE_ROLE: &str = "none";

/// Expert roles the backend ships with.
pub const BUILTIN_ROLES: [&str; 5] = [
    "SoftwareEngineer",
    "BusinessConsultant",
    "AgricultureExpert",
    "CivilEngineer",
    "Educator",
];

pub fn is_base_role(role: &str) -> bool {
    role == BASE_ROLE
}

pub fn is_builtin(role: &str) -> bool {
    BUILTIN_ROLES.contains(&role)
}

/// `SoftwareEngineer` -> `Software Engineer`.
pub fn pretty_role(role: &str) -> String {
    if is_base_role(role) {
        return "Base Model".to_string();
    }

    let mut pretty = String::with_capacity(role.len() + 4);
    for c in role.chars() {
        if c.is_uppercase() && !pretty.is_empty() && !pretty.ends_with(' ') {
            pretty.push(' ');
        }
        pretty.push(c);
    }
    pretty
}
