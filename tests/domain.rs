use assert_matches::assert_matches;

use kira_provision::domain::{Action, Task};
use kira_provision::error::ProvisionError;

#[test]
fn every_task_name_parses() {
    for name in [
        "all",
        "db_install",
        "db_setup",
        "tools_install",
        "tools_setup",
        "ref",
        "example",
    ] {
        let task: Task = name.parse().unwrap();
        assert_eq!(task.as_str(), name);
    }
}

#[test]
fn unknown_task_is_rejected() {
    let err = "references".parse::<Task>().unwrap_err();
    assert_matches!(err, ProvisionError::InvalidTask(name) if name == "references");
    assert_matches!("All".parse::<Task>(), Err(ProvisionError::InvalidTask(_)));
    assert_matches!("".parse::<Task>(), Err(ProvisionError::InvalidTask(_)));
}

#[test]
fn default_task_is_all() {
    assert_eq!(Task::default(), Task::All);
    assert_eq!(Task::default().actions(), Task::All.actions());
}

#[test]
fn single_tasks_map_to_their_actions() {
    assert_eq!(
        Task::ToolsInstall.actions(),
        vec![Action::InstallPrimaryTool, Action::InstallAnnotationTool]
    );
    assert_eq!(Task::ToolsSetup.actions(), vec![Action::SetupAnnotationTool]);
    assert_eq!(Task::DbInstall.actions(), vec![Action::InstallDatabases]);
    assert_eq!(Task::DbSetup.actions(), vec![Action::SetupDatabases]);
    assert_eq!(Task::Ref.actions(), vec![Action::InstallReferences]);
    assert_eq!(Task::Example.actions(), vec![Action::InstallExamples]);
}

#[test]
fn all_concatenates_tasks_in_sequence() {
    let expected = Task::SEQUENCE
        .iter()
        .flat_map(|task| task.actions())
        .collect::<Vec<_>>();
    assert_eq!(Task::All.actions(), expected);
    assert_eq!(Task::SEQUENCE[0], Task::ToolsInstall);
    assert_eq!(Task::SEQUENCE[5], Task::Example);
}
