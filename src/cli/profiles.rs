use crate::profiles::ProfileRegistry;

pub fn run() {
    let registry = ProfileRegistry::default();
    for profile in registry.list_profiles() {
        println!(
            "{} ({})\n  {}",
            profile.name,
            registry.resolve_model(&profile.name),
            profile.markdown_description
        );
    }
}
