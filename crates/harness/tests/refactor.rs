use templar_core::{AssetType, PropertyMap, PropertyValue, value::map_of};
use templar_engine::{EngineError, RefactorOutcome};
use templar_harness::{SeedSet, TestSession, init_tracing};

fn containers() -> SeedSet {
    SeedSet::new()
        .folder("ContainerA")
        .node("ContainerA::ChildWidget", None, map_of([("size", 3)]))
        .node("DependentWidget", Some("ContainerA"), PropertyMap::new())
}

fn servers() -> SeedSet {
    SeedSet::new()
        .folder("tpl")
        .node("tpl::Server", None, map_of([("cpu", 2)]))
        .node("tpl::Server::Disk", None, map_of([("size", 100)]))
        .folder("prod")
        .node("prod::Web", Some("tpl::Server"), PropertyMap::new())
        .node("prod::Web::Disk", None, map_of([("size", 500)]))
        .node("prod::Web::Disk::Partition", None, PropertyMap::new())
        .node("prod::Db", Some("tpl::Server"), PropertyMap::new())
}

// ============================================================================
// Cascading rename
// ============================================================================

#[test]
fn rename_cascades_to_descendants_and_template_links() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let mut t = TestSession::new(containers())?;
    let container = t.id("ContainerA");

    let RefactorOutcome::NeedsConfirmation(consequences) = t.session.rename_asset(container, "RenamedContainer")? else {
        return Err("rename with dependents should need confirmation".into());
    };
    assert_eq!(consequences.descendant_updates.len(), 1);
    assert_eq!(consequences.descendant_updates[0].id, t.id("ContainerA::ChildWidget"));
    assert_eq!(consequences.descendant_updates[0].new_fqn, "RenamedContainer::ChildWidget");
    assert_eq!(consequences.template_link_updates.len(), 1);
    assert_eq!(consequences.template_link_updates[0].id, t.id("DependentWidget"));
    assert_eq!(consequences.template_link_updates[0].new_template, "RenamedContainer");
    assert!(consequences.shadow_updates.is_empty());
    assert_eq!((consequences.old_key.as_str(), consequences.new_key.as_str()), ("ContainerA", "RenamedContainer"));

    // Planning alone changes nothing.
    assert!(!t.session.has_pending_changes());

    t.session.apply_refactor(consequences)?;
    assert_eq!(t.session.pending_changes().upserted.len(), 3);
    assert_eq!(t.live_fqn(container).as_deref(), Some("RenamedContainer"));
    assert_eq!(
        t.live_fqn(t.id("ContainerA::ChildWidget")).as_deref(),
        Some("RenamedContainer::ChildWidget")
    );
    let merged = t.session.resolve(t.id("DependentWidget"))?;
    assert_eq!(merged.inheritance_chain, vec!["RenamedContainer"]);
    assert_eq!(
        t.session.undo_label().as_deref(),
        Some("Rename ContainerA to RenamedContainer")
    );

    // One undo step reverts the whole cascade.
    t.session.undo()?;
    assert!(t.session.workspace().pending().is_empty());
    t.session.redo()?;
    assert_eq!(t.session.pending_changes().upserted.len(), 3);
    Ok(())
}

#[test]
fn leaf_rename_without_dependents_applies_directly() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestSession::new(containers())?;
    let child = t.id("ContainerA::ChildWidget");

    let outcome = t.session.rename_asset(child, "Widget")?;
    assert!(matches!(outcome, RefactorOutcome::Applied(ref c) if c.is_trivial()));
    assert_eq!(t.live_fqn(child).as_deref(), Some("ContainerA::Widget"));
    assert!(t.session.can_undo());
    Ok(())
}

#[test]
fn rename_rejects_taken_fqn() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestSession::new(containers())?;
    let result = t.session.rename_asset(t.id("ContainerA"), "DependentWidget");
    assert!(matches!(result, Err(EngineError::FqnTaken(_))));
    assert!(!t.session.can_undo());
    Ok(())
}

#[test]
fn stale_plan_is_refused() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestSession::new(containers())?;
    let container = t.id("ContainerA");

    let plan = t.session.plan_refactor(container, "Later")?;
    let RefactorOutcome::NeedsConfirmation(other) = t.session.rename_asset(container, "Sooner")? else {
        return Err("expected confirmation".into());
    };
    t.session.apply_refactor(other)?;

    assert!(matches!(t.session.apply_refactor(plan), Err(EngineError::StaleCommand(_))));
    assert_eq!(t.live_fqn(container).as_deref(), Some("Sooner"));
    Ok(())
}

// ============================================================================
// Shadow children
// ============================================================================

#[test]
fn renaming_template_child_renames_shadow_overrides() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestSession::new(servers())?;

    let RefactorOutcome::NeedsConfirmation(consequences) =
        t.session.rename_asset(t.id("tpl::Server::Disk"), "Storage")?
    else {
        return Err("shadow rename should need confirmation".into());
    };
    let shadows: Vec<_> = consequences
        .shadow_updates
        .iter()
        .map(|u| (u.old_fqn.clone(), u.new_fqn.clone()))
        .collect();
    assert_eq!(
        shadows,
        vec![
            ("prod::Web::Disk".to_string(), "prod::Web::Storage".to_string()),
            (
                "prod::Web::Disk::Partition".to_string(),
                "prod::Web::Storage::Partition".to_string()
            ),
        ]
    );

    t.session.apply_refactor(consequences)?;
    let shadow = t.live_by_fqn("prod::Web::Storage").ok_or("shadow not renamed")?;
    assert_eq!(shadow.id, t.id("prod::Web::Disk"));
    assert_eq!(shadow.overrides.get("size"), Some(&PropertyValue::Integer(500)));
    assert!(t.live_by_fqn("prod::Web::Disk").is_none());
    assert_eq!(t.session.pending_changes().upserted.len(), 3);
    Ok(())
}

#[test]
fn links_to_renamed_shadows_follow_them() -> Result<(), Box<dyn std::error::Error>> {
    let seed = servers()
        .node("prod::Backup", Some("prod::Web::Disk"), PropertyMap::new())
        .node("prod::Scratch", Some("prod::Web::Disk::Partition"), PropertyMap::new());
    let mut t = TestSession::new(seed)?;

    let RefactorOutcome::NeedsConfirmation(consequences) =
        t.session.rename_asset(t.id("tpl::Server::Disk"), "Storage")?
    else {
        return Err("shadow rename should need confirmation".into());
    };
    let links: Vec<_> = consequences
        .template_link_updates
        .iter()
        .map(|u| (u.fqn.as_str(), u.new_template.as_str()))
        .collect();
    assert_eq!(
        links,
        vec![
            ("prod::Backup", "prod::Web::Storage"),
            ("prod::Scratch", "prod::Web::Storage::Partition"),
        ]
    );

    t.session.apply_refactor(consequences)?;
    let merged = t.session.resolve(t.id("prod::Backup"))?;
    assert_eq!(merged.inheritance_chain, vec!["prod::Web::Storage"]);
    assert_eq!(merged.properties.get("size"), Some(&PropertyValue::Integer(500)));
    assert!(t.session.resolve(t.id("prod::Scratch")).is_ok());
    t.session.commit()?;
    Ok(())
}

#[test]
fn moving_template_child_leaves_shadows_alone() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestSession::new(servers().folder("archive"))?;
    let disk = t.id("tpl::Server::Disk");

    let outcome = t.session.move_asset(disk, Some("archive"))?;
    assert!(matches!(outcome, RefactorOutcome::Applied(_)));
    assert_eq!(t.live_fqn(disk).as_deref(), Some("archive::Disk"));
    assert!(t.live_by_fqn("prod::Web::Disk").is_some());
    Ok(())
}

// ============================================================================
// Moves
// ============================================================================

#[test]
fn move_carries_the_subtree() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestSession::new(servers().folder("staging"))?;

    let RefactorOutcome::NeedsConfirmation(consequences) = t.session.move_asset(t.id("prod::Web"), Some("staging"))? else {
        return Err("subtree move should need confirmation".into());
    };
    assert_eq!(consequences.new_fqn, "staging::Web");
    assert_eq!(consequences.descendant_updates.len(), 2);
    t.session.apply_refactor(consequences)?;

    assert!(t.live_by_fqn("staging::Web::Disk::Partition").is_some());
    assert!(t.live_by_fqn("prod::Web").is_none());
    Ok(())
}

#[test]
fn move_to_top_level_and_into_self() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestSession::new(servers())?;
    let db = t.id("prod::Db");

    t.session.move_asset(db, None)?;
    assert_eq!(t.live_fqn(db).as_deref(), Some("Db"));

    let into_self = t.session.move_asset(t.id("prod::Web"), Some("prod::Web::Disk"));
    assert!(matches!(into_self, Err(EngineError::MoveIntoSelf { .. })));
    Ok(())
}

#[test]
fn move_checks_placement() -> Result<(), Box<dyn std::error::Error>> {
    let seed = servers()
        .folder("pkgs")
        .add("pkgs::Nginx", AssetType::Package, None, PropertyMap::new())
        .add("pkgs::Nginx::Tls", AssetType::PackageOption, None, PropertyMap::new());
    let mut t = TestSession::new(seed)?;

    let result = t.session.move_asset(t.id("pkgs::Nginx::Tls"), Some("prod"));
    assert!(matches!(result, Err(EngineError::PlacementDenied { .. })));
    Ok(())
}

#[test]
fn commit_persists_a_cascading_rename() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestSession::new(containers())?;
    let RefactorOutcome::NeedsConfirmation(consequences) = t.session.rename_asset(t.id("ContainerA"), "RenamedContainer")? else {
        return Err("expected confirmation".into());
    };
    t.session.apply_refactor(consequences)?;

    let receipt = t.session.commit()?;
    assert_eq!(receipt.upserted, 3);
    assert_eq!(t.session.store().commit_count(), 1);
    assert!(t.session.resolve(t.id("DependentWidget")).is_ok());
    assert!(!t.session.can_undo());
    Ok(())
}
