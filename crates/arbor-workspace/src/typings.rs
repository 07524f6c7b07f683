use arbor_core::TypeAcquisition;
use arbor_project::ProjectName;

/// Contract with the typings-acquisition subsystem.
///
/// The coordinator requests installs when a project with acquisition enabled
/// is created or reloaded, and forwards installer responses back into the
/// project via `ProjectSet::apply_typings_response`.
pub trait TypingsInstaller: Send {
    fn enqueue_install(
        &mut self,
        project: &ProjectName,
        acquisition: &TypeAcquisition,
        unresolved_imports: &[String],
    );

    fn invalidate(&mut self, project: &ProjectName);
}

/// Installer used when typings acquisition is not wired up.
#[derive(Debug, Default)]
pub struct NoopTypingsInstaller;

impl TypingsInstaller for NoopTypingsInstaller {
    fn enqueue_install(
        &mut self,
        _project: &ProjectName,
        _acquisition: &TypeAcquisition,
        _unresolved_imports: &[String],
    ) {
    }

    fn invalidate(&mut self, _project: &ProjectName) {}
}
