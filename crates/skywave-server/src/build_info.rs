pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn build_source() -> &'static str {
    option_env!("SKYWAVE_BUILD_SOURCE").unwrap_or("unknown")
}

pub fn release_tag() -> Option<&'static str> {
    option_env!("SKYWAVE_RELEASE_TAG")
}

pub fn profile() -> &'static str {
    option_env!("SKYWAVE_PROFILE").unwrap_or("release")
}

pub fn target() -> &'static str {
    option_env!("SKYWAVE_TARGET").unwrap_or("")
}

pub fn git_commit() -> Option<&'static str> {
    option_env!("SKYWAVE_GIT_COMMIT")
}

pub fn git_tag() -> Option<&'static str> {
    option_env!("SKYWAVE_GIT_TAG")
}

pub fn git_dirty() -> Option<bool> {
    option_env!("SKYWAVE_GIT_DIRTY").and_then(|s| match s {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    })
}
