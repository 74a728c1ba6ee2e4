//! `ios/Podfile` edits
//!
//! Two edits, both idempotent: a `post_install` hook that silences warnings
//! from pods, and a local-path override for the audioplayers_darwin pod.

use flutterkit_cli::output::Status;
use flutterkit_core::error::Result;
use flutterkit_core::patch::{backup_once, rewrite_file};
use std::path::Path;

/// Marker line that identifies the audioplayers override
pub const AUDIOPLAYERS_MARKER: &str = "# Fix for audioplayers_darwin";

const POST_INSTALL_HOOK: &str = "post_install do |installer|";

const RUNNER_TARGETS: [&str; 2] = ["target 'Runner' do", "target \"Runner\" do"];

/// The warning-suppression `post_install` hook
pub fn post_install_block(deployment_target: &str) -> String {
    format!(
        r#"
post_install do |installer|
  installer.pods_project.targets.each do |target|
    target.build_configurations.each do |config|
      config.build_settings['GCC_WARN_INHIBIT_ALL_WARNINGS'] = 'YES'
      config.build_settings['SWIFT_SUPPRESS_WARNINGS'] = 'YES'

      # Deprecated APIs
      config.build_settings['CLANG_WARN_DEPRECATED_OBJC_IMPLEMENTATIONS'] = 'NO'
      config.build_settings['GCC_WARN_ABOUT_DEPRECATED_FUNCTIONS'] = 'NO'

      # Type conversions
      config.build_settings['GCC_WARN_ABOUT_INCOMPATIBLE_POINTER_TYPES'] = 'NO'
      config.build_settings['GCC_WARN_64_TO_32_BIT_CONVERSION'] = 'NO'

      # Unused variables
      config.build_settings['GCC_WARN_UNUSED_VARIABLE'] = 'NO'
      config.build_settings['GCC_WARN_UNUSED_VALUE'] = 'NO'

      # Apple Silicon simulators
      config.build_settings['EXCLUDED_ARCHS[sdk=iphonesimulator*]'] = 'arm64'

      config.build_settings['IPHONEOS_DEPLOYMENT_TARGET'] = '{}'
    end
  end
end
"#,
        deployment_target
    )
}

/// Append the hook unless the Podfile already has a `post_install`
pub fn with_post_install(content: &str, deployment_target: &str) -> String {
    if content.contains(POST_INSTALL_HOOK) {
        return content.to_string();
    }
    let mut out = content.to_string();
    out.push_str(&post_install_block(deployment_target));
    out
}

/// Add the warning-suppression hook to `ios/Podfile`
///
/// Returns `true` when the Podfile was changed.
pub fn add_warning_suppression(ios_dir: &Path, deployment_target: &str) -> Result<bool> {
    let podfile = ios_dir.join("Podfile");
    if !podfile.is_file() {
        Status::warning(&format!("Podfile not found: {}", podfile.display()));
        return Ok(false);
    }
    let changed = rewrite_file(&podfile, false, |content| {
        with_post_install(content, deployment_target)
    })?;
    if changed {
        Status::success("Added warning suppression to the Podfile");
    }
    Ok(changed)
}

/// Insert the audioplayers override right after the Runner target line
///
/// Returns `None` when the override is already present or there is no
/// Runner target.
pub fn with_audioplayers_override(content: &str, pod_path: &Path) -> Option<String> {
    if content.contains(AUDIOPLAYERS_MARKER) {
        return None;
    }
    let target = RUNNER_TARGETS.iter().find(|t| content.contains(*t))?;
    let insertion = format!(
        "{}\n  {}\n  pod 'audioplayers_darwin', :path => '{}'",
        target,
        AUDIOPLAYERS_MARKER,
        pod_path.display()
    );
    Some(content.replacen(target, &insertion, 1))
}

/// Point the audioplayers_darwin pod at a local path, backing the Podfile up
pub fn override_audioplayers_pod(ios_dir: &Path, pod_path: &Path) -> Result<bool> {
    let podfile = ios_dir.join("Podfile");
    if !podfile.is_file() {
        Status::error(&format!("Podfile not found: {}", podfile.display()));
        return Ok(false);
    }
    let content = std::fs::read_to_string(&podfile)?;
    let Some(updated) = with_audioplayers_override(&content, pod_path) else {
        return Ok(false);
    };
    backup_once(&podfile)?;
    std::fs::write(&podfile, updated)?;
    tracing::warn!(pod_path = %pod_path.display(), "Overrode the audioplayers_darwin pod");
    Status::success("Added the audioplayers_darwin override to the Podfile");
    Ok(true)
}
