//! Project templates offered by the plugin and what creating each one must
//! produce.
//!
//! The wizard scenarios walk every listed template, create a project with
//! both build systems and then check the outcome against
//! [`ProjectExpectations`]: the default project name, the files written to
//! disk, the file opened in the editor and the build artifact.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// Budget for CMake configuration to finish before a build can start.
pub const CONFIGURE_TIMEOUT: Duration = Duration::from_secs(230);

/// Budget for a solution build.
pub const BUILD_TIMEOUT: Duration = Duration::from_secs(100);

/// Budget for the build artifact to appear on disk after the build ends.
pub const ARTIFACT_TIMEOUT: Duration = Duration::from_secs(15);

/// Major version of Visual Studio 2019.
pub const VS2019_MAJOR: u32 = 16;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProjectError {
    #[error("unknown project template '{0}'")]
    UnknownTemplate(String),

    #[error("unknown build system '{0}'")]
    UnknownBuildSystem(String),

    #[error("'{template}' does not support {build_system}")]
    Unsupported {
        template: ProjectTemplate,
        build_system: BuildSystem,
    },

    #[error("{build_system} projects are not exercised on IDE version {ide_version}")]
    UnsupportedOnIde { build_system: BuildSystem, ide_version: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProjectTemplate {
    DesignerCustomWidget,
    ConsoleApplication,
    ActiveQtServer,
    QuickApplication,
    EmptyApplication,
    ClassLibrary,
    WidgetsApplication,
}

/// Build system chosen on the second wizard page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BuildSystem {
    MsBuild,
    CMake,
}

/// Kind of file a successful build leaves behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Artifact {
    Executable,
    Library,
    /// Nothing to link; only the output directory is created.
    Directory,
}

impl ProjectTemplate {
    pub const ALL: [ProjectTemplate; 7] = [
        ProjectTemplate::DesignerCustomWidget,
        ProjectTemplate::ConsoleApplication,
        ProjectTemplate::ActiveQtServer,
        ProjectTemplate::QuickApplication,
        ProjectTemplate::EmptyApplication,
        ProjectTemplate::ClassLibrary,
        ProjectTemplate::WidgetsApplication,
    ];

    /// Name shown in the template list.
    pub fn display_name(self) -> &'static str {
        match self {
            ProjectTemplate::DesignerCustomWidget => "Qt Designer Custom Widget",
            ProjectTemplate::ConsoleApplication => "Qt Console Application",
            ProjectTemplate::ActiveQtServer => "Qt ActiveQt Server",
            ProjectTemplate::QuickApplication => "Qt Quick Application",
            ProjectTemplate::EmptyApplication => "Qt Empty Application",
            ProjectTemplate::ClassLibrary => "Qt Class Library",
            ProjectTemplate::WidgetsApplication => "Qt Widgets Application",
        }
    }

    /// Prefix of the project name the IDE proposes. A numeric suffix is
    /// appended when a project of that name already exists.
    pub fn expected_name(self) -> String {
        match self {
            ProjectTemplate::ActiveQtServer => "ActiveQtServer".to_string(),
            ProjectTemplate::DesignerCustomWidget => "QtDesignerWidget".to_string(),
            ProjectTemplate::EmptyApplication => "QtApplication".to_string(),
            other => other.display_name().replace(' ', ""),
        }
    }

    pub fn wizard_title(self) -> String {
        format!("{} Wizard", self.display_name())
    }

    /// Text every wizard page starts with.
    pub fn wizard_welcome(self) -> String {
        match self {
            ProjectTemplate::DesignerCustomWidget => "Welcome to the Qt Custom Designer Widget".to_string(),
            other => format!("Welcome to the {} Wizard", other.display_name()),
        }
    }

    /// Templates with a class page have three wizard pages, the rest two.
    pub fn wizard_pages(self) -> u8 {
        match self {
            ProjectTemplate::ActiveQtServer
            | ProjectTemplate::ClassLibrary
            | ProjectTemplate::DesignerCustomWidget
            | ProjectTemplate::WidgetsApplication => 3,
            _ => 2,
        }
    }

    pub fn supports(self, build_system: BuildSystem) -> bool {
        !(self == ProjectTemplate::ActiveQtServer && build_system == BuildSystem::CMake)
    }

    /// Whether the build system combo box is enabled in the wizard.
    pub fn build_system_selectable(self) -> bool {
        self != ProjectTemplate::ActiveQtServer
    }

    /// Pattern the name of the file opened after creation must match, or
    /// `None` when no file is opened.
    pub fn opened_file_pattern(self) -> Option<&'static str> {
        match self {
            ProjectTemplate::DesignerCustomWidget => Some(r"^QtDesigner.*\.cpp$"),
            ProjectTemplate::ConsoleApplication => Some(r"^main\.cpp$"),
            ProjectTemplate::ActiveQtServer => Some(r"^ActiveQtServer\d*\.cpp$"),
            ProjectTemplate::QuickApplication => Some(r"^main\.qml$"),
            ProjectTemplate::EmptyApplication => None,
            ProjectTemplate::ClassLibrary => Some(r"^QtClassLibrary\d*\.cpp$"),
            ProjectTemplate::WidgetsApplication => Some(r"^QtWidgets.*\.cpp$"),
        }
    }

    pub fn opened_file_matches(self, file_name: &str) -> bool {
        match self.opened_file_pattern() {
            Some(pattern) => Regex::new(pattern).is_ok_and(|re| re.is_match(file_name)),
            None => false,
        }
    }

    /// `None` for templates whose build is not checked.
    pub fn artifact(self) -> Option<Artifact> {
        match self {
            ProjectTemplate::ConsoleApplication
            | ProjectTemplate::QuickApplication
            | ProjectTemplate::WidgetsApplication => Some(Artifact::Executable),
            ProjectTemplate::ClassLibrary | ProjectTemplate::DesignerCustomWidget => Some(Artifact::Library),
            ProjectTemplate::EmptyApplication => Some(Artifact::Directory),
            ProjectTemplate::ActiveQtServer => None,
        }
    }

    /// Template-specific sources, relative to the inner project directory.
    fn source_files(self, project: &str, build_system: BuildSystem) -> Vec<String> {
        let msbuild = build_system == BuildSystem::MsBuild;
        let mut files = Vec::new();
        match self {
            ProjectTemplate::DesignerCustomWidget => {
                files.push(format!("{project}.cpp"));
                files.push(format!("{project}.h"));
                files.push(format!("{project}Plugin.cpp"));
                files.push(format!("{project}Plugin.h"));
                files.push(format!("{}plugin.json", project.to_lowercase()));
            }
            ProjectTemplate::ConsoleApplication => files.push("main.cpp".into()),
            ProjectTemplate::ActiveQtServer => {
                for ext in ["cpp", "def", "h", "ico", "rc", "ui"] {
                    files.push(format!("{project}.{ext}"));
                }
            }
            ProjectTemplate::QuickApplication => {
                if msbuild {
                    files.push("qml.qrc".into());
                }
                files.push("main.cpp".into());
                files.push("main.qml".into());
            }
            ProjectTemplate::EmptyApplication => {}
            ProjectTemplate::ClassLibrary => {
                files.push(format!("{project}.cpp"));
                files.push(format!("{project}.h"));
                files.push(format!("{}_global.h", project.to_lowercase()));
            }
            ProjectTemplate::WidgetsApplication => {
                if msbuild {
                    files.push(format!("{project}.qrc"));
                }
                files.push("main.cpp".into());
                for ext in ["cpp", "h", "ui"] {
                    files.push(format!("{project}.{ext}"));
                }
            }
        }
        files
    }
}

impl fmt::Display for ProjectTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ProjectTemplate {
    type Err = ProjectError;

    /// Accepts the display name, case-insensitively, with or without the
    /// `Qt ` prefix and spaces (`"Qt Console Application"`,
    /// `"ConsoleApplication"`, `"console application"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s);
        ProjectTemplate::ALL
            .into_iter()
            .find(|t| normalize(t.display_name()) == wanted)
            .ok_or_else(|| ProjectError::UnknownTemplate(s.to_string()))
    }
}

fn normalize(name: &str) -> String {
    let compact: String = name.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_lowercase();
    match compact.strip_prefix("qt") {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => compact,
    }
}

impl BuildSystem {
    pub const ALL: [BuildSystem; 2] = [BuildSystem::MsBuild, BuildSystem::CMake];

    /// Entry in the wizard's project model combo box.
    pub fn display_name(self) -> &'static str {
        match self {
            BuildSystem::MsBuild => "Qt Visual Studio Project (Qt/MSBuild)",
            BuildSystem::CMake => "CMake Project for Qt (cmake-qt, Qt/CMake helper functions)",
        }
    }

    pub fn is_cmake(self) -> bool {
        self == BuildSystem::CMake
    }

    /// Whether wizard scenarios use this build system on the given IDE major
    /// version. CMake is skipped on VS 2019; an unpinned version allows
    /// everything.
    pub fn supported_on(self, ide_version: Option<u32>) -> bool {
        !(self.is_cmake() && ide_version == Some(VS2019_MAJOR))
    }
}

/// Whether the "Configure your new project" dialog shows the
/// [`creation_path_message`] label. VS 2019 does not.
pub fn shows_creation_path(ide_version: Option<u32>) -> bool {
    ide_version != Some(VS2019_MAJOR)
}

impl fmt::Display for BuildSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for BuildSystem {
    type Err = ProjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "msbuild" | "qt/msbuild" => Ok(BuildSystem::MsBuild),
            "cmake" | "qt/cmake" => Ok(BuildSystem::CMake),
            _ => BuildSystem::ALL
                .into_iter()
                .find(|b| b.display_name() == s)
                .ok_or_else(|| ProjectError::UnknownBuildSystem(s.to_string())),
        }
    }
}

/// Files a wizard run must leave in `workdir`.
///
/// Solution-level files live in `workdir/project`, sources in
/// `workdir/project/project`.
pub fn expected_written_files(
    workdir: &Path,
    project: &str,
    template: ProjectTemplate,
    build_system: BuildSystem,
) -> Vec<PathBuf> {
    let solution_dir = workdir.join(project);
    let project_dir = solution_dir.join(project);

    let mut files: Vec<PathBuf> = match build_system {
        BuildSystem::CMake => vec![
            solution_dir.join("CMakeLists.txt"),
            solution_dir.join("CMakePresets.json"),
            solution_dir.join("CMakeUserPresets.json"),
            project_dir.join("CMakeLists.txt"),
            project_dir.join("qt.cmake"),
        ],
        BuildSystem::MsBuild => vec![
            solution_dir.join(format!("{project}.sln")),
            project_dir.join(format!("{project}.vcxproj")),
            project_dir.join(format!("{project}.vcxproj.filters")),
            project_dir.join(format!("{project}.vcxproj.user")),
        ],
    };
    files.extend(
        template
            .source_files(project, build_system)
            .into_iter()
            .map(|f| project_dir.join(f)),
    );
    files
}

/// Path of the build artifact, or `None` when the template's build is not
/// checked.
///
/// MSBuild output goes to `x64\Debug` when the solution has an x64
/// platform, `Debug` otherwise. CMake output goes to `out/build/<project>`.
pub fn expected_build_output(
    workdir: &Path,
    project: &str,
    template: ProjectTemplate,
    build_system: BuildSystem,
    x64: bool,
) -> Option<PathBuf> {
    let artifact = template.artifact()?;
    let mut dir = workdir.join(project);
    match build_system {
        BuildSystem::CMake => dir = dir.join("out").join("build").join(project),
        BuildSystem::MsBuild => {
            if x64 {
                dir = dir.join("x64");
            }
            dir = dir.join("Debug");
        }
    }
    Some(match artifact {
        Artifact::Executable => dir.join(format!("{project}.exe")),
        Artifact::Library => dir.join(format!("{project}.dll")),
        Artifact::Directory => dir,
    })
}

/// Text of the "Configure your new project" dialog's location label.
pub fn creation_path_message(location: &Path, solution: &str, project: &str) -> String {
    let mut path = location.join(solution).join(project).into_os_string();
    path.push(std::path::MAIN_SEPARATOR_STR);
    format!("Project will be created in \"{}\"", path.to_string_lossy())
}

/// Everything a wizard scenario checks for one template and build system.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectExpectations {
    pub template: ProjectTemplate,
    pub build_system: BuildSystem,
    pub project_name: String,
    pub wizard_pages: u8,
    pub opened_file_pattern: Option<&'static str>,
    /// Whether the location label is checked in the new-project dialog.
    pub creation_path_label: bool,
    pub written_files: Vec<PathBuf>,
    pub build_output: Option<PathBuf>,
}

impl ProjectExpectations {
    /// `ide_version` is the IDE major version the run targets, `None` when
    /// not pinned.
    pub fn new(
        workdir: &Path,
        project: &str,
        template: ProjectTemplate,
        build_system: BuildSystem,
        x64: bool,
        ide_version: Option<u32>,
    ) -> Result<Self, ProjectError> {
        if !template.supports(build_system) {
            return Err(ProjectError::Unsupported { template, build_system });
        }
        if let Some(ide_version) = ide_version.filter(|_| !build_system.supported_on(ide_version)) {
            return Err(ProjectError::UnsupportedOnIde {
                build_system,
                ide_version,
            });
        }
        Ok(Self {
            template,
            build_system,
            project_name: project.to_string(),
            wizard_pages: template.wizard_pages(),
            opened_file_pattern: template.opened_file_pattern(),
            creation_path_label: shows_creation_path(ide_version),
            written_files: expected_written_files(workdir, project, template, build_system),
            build_output: expected_build_output(workdir, project, template, build_system, x64),
        })
    }

    /// Written files that do not exist.
    pub fn missing_files(&self) -> Vec<&Path> {
        self.written_files
            .iter()
            .map(PathBuf::as_path)
            .filter(|p| !p.exists())
            .collect()
    }
}
