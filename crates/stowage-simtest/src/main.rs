//! Stowage Headless Placement Harness
//!
//! Validates placement logic and data without the host runtime.
//! Runs entirely in-process: no replication and no rendering.
//!
//! Usage:
//!   cargo run -p stowage-simtest
//!   cargo run -p stowage-simtest -- --verbose

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use stowage_core::prelude::*;
use stowage_logic::{
    CapacityPolicy, Cell, CellRect, ItemId, ItemSize, ItemSpec, RejectReason, Rotation,
    StorageConfig, StorageGrid,
};

// ── Storage manifest (same JSON the content pipeline ships) ─────────────
const MANIFEST_JSON: &str = include_str!("../../../data/storage_manifest.json");

#[derive(Debug, Deserialize)]
struct StorageArchetype {
    name: String,
    region: Vec<CellRect>,
    #[serde(default)]
    policy: CapacityPolicy,
    #[serde(default)]
    max_item_size: Option<ItemSize>,
    #[serde(default)]
    whitelist: Option<Vec<String>>,
    #[serde(default)]
    blacklist: Vec<String>,
}

impl StorageArchetype {
    fn to_config(&self) -> StorageConfig {
        StorageConfig {
            region: self.region.clone(),
            policy: self.policy,
            max_item_size: self.max_item_size,
            whitelist: self.whitelist.clone(),
            blacklist: self.blacklist.clone(),
        }
    }

    /// A 1x1 probe item this archetype should accept.
    fn probe_item(&self) -> ItemSpec {
        let mut spec = ItemSpec::of_size(1, 1, ItemSize::Tiny);
        if let Some(tags) = &self.whitelist {
            if let Some(tag) = tags.first() {
                spec = spec.with_tag(tag.clone());
            }
        }
        spec
    }
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn check(name: &str, passed: bool, detail: impl Into<String>) -> TestResult {
    TestResult {
        name: name.into(),
        passed,
        detail: detail.into(),
    }
}

fn main() {
    let verbose = std::env::args().any(|a| a == "--verbose");
    println!("=== Stowage Placement Harness ===\n");

    let mut results = Vec::new();

    // 1. Storage manifest validation
    results.extend(validate_manifest(verbose));

    // 2. Scripted placement scenarios
    results.extend(validate_scripted_scenarios(verbose));

    // 3. Rotation and irregular regions
    results.extend(validate_rotation_and_regions(verbose));

    // 4. Auto-placement determinism
    results.extend(validate_determinism(verbose));

    // 5. Randomized insert/remove churn
    results.extend(validate_churn(verbose));

    // 6. World integration (components, events, save/load)
    results.extend(validate_world_integration(verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── 1. Storage manifest ─────────────────────────────────────────────────

fn validate_manifest(verbose: bool) -> Vec<TestResult> {
    println!("--- Storage Manifest ---");
    let mut results = Vec::new();

    let manifest: Vec<StorageArchetype> = match serde_json::from_str(MANIFEST_JSON) {
        Ok(m) => m,
        Err(e) => {
            results.push(check(
                "manifest_parse",
                false,
                format!("JSON parse error: {}", e),
            ));
            return results;
        }
    };

    results.push(check(
        "manifest_not_empty",
        !manifest.is_empty(),
        format!("{} archetypes", manifest.len()),
    ));

    for archetype in &manifest {
        let mut grid = StorageGrid::new(archetype.to_config());
        let cells = grid.region().cell_count();

        results.push(check(
            &format!("{}_region_usable", archetype.name),
            cells > 0,
            format!("{} usable cells", cells),
        ));

        let probe = archetype.probe_item();
        let placed = grid.try_auto_place(ItemId(1), &probe);
        results.push(check(
            &format!("{}_accepts_probe", archetype.name),
            placed.is_ok(),
            format!("{:?}", placed),
        ));

        let usage_consistent = match (grid.capacity_usage(), grid.policy()) {
            (None, CapacityPolicy::Unlimited) => true,
            (Some((used, _)), CapacityPolicy::WeightLimited(_)) => {
                used == grid.cumulative_weight()
            }
            (Some((used, _)), CapacityPolicy::SlotLimited(_)) => used == grid.item_count() as u64,
            _ => false,
        };
        results.push(check(
            &format!("{}_capacity_usage", archetype.name),
            usage_consistent,
            format!("{:?}", grid.capacity_usage()),
        ));

        if verbose {
            println!(
                "  {}: {} cells, policy {:?}",
                archetype.name,
                cells,
                grid.policy()
            );
        }
    }

    results
}

// ── 2. Scripted scenarios ───────────────────────────────────────────────

fn validate_scripted_scenarios(_verbose: bool) -> Vec<TestResult> {
    println!("--- Scripted Scenarios ---");
    let mut results = Vec::new();
    let unit = ItemSpec::of_size(1, 1, ItemSize::Small);

    // 2x2 region walk-through.
    {
        let mut grid =
            StorageGrid::new(StorageConfig::with_region(vec![CellRect::new(0, 0, 2, 2)]));
        let a_ok = grid
            .try_insert(ItemId(1), &unit, Cell::new(0, 0), Rotation::Deg0)
            .is_ok();
        let b_overlap = grid.try_insert(ItemId(2), &unit, Cell::new(0, 0), Rotation::Deg0)
            == Err(RejectReason::Overlaps);
        let b_ok = grid
            .try_insert(ItemId(2), &unit, Cell::new(1, 0), Rotation::Deg0)
            .is_ok();
        let removed = grid.remove(ItemId(1)).is_some() && !grid.contains(ItemId(1));
        let big = ItemSpec::of_size(2, 2, ItemSize::Large);
        let c_oob = grid.try_insert(ItemId(3), &big, Cell::new(1, 0), Rotation::Deg0)
            == Err(RejectReason::OutOfBounds);
        let c_no_space = grid.try_auto_place(ItemId(3), &big) == Err(RejectReason::NoSpace);

        results.push(check(
            "scenario_2x2",
            a_ok && b_overlap && b_ok && removed && c_oob && c_no_space,
            "insert/overlap/remove/oversize walk-through",
        ));
    }

    // Weight limit 10: 4 + 4 fits, 3 more does not.
    {
        let mut grid = StorageGrid::new(
            StorageConfig::with_region(vec![CellRect::new(0, 0, 4, 4)])
                .with_policy(CapacityPolicy::WeightLimited(10)),
        );
        let w4 = ItemSpec::new(1, 1, 4, ItemSize::Small);
        let w3 = ItemSpec::new(1, 1, 3, ItemSize::Small);
        let two_fit = grid.try_auto_place(ItemId(1), &w4).is_ok()
            && grid.try_auto_place(ItemId(2), &w4).is_ok();
        let third = grid.try_auto_place(ItemId(3), &w3);
        results.push(check(
            "scenario_weight_limit",
            two_fit && third == Err(RejectReason::TooHeavy) && grid.cumulative_weight() == 8,
            format!("total weight {}", grid.cumulative_weight()),
        ));
    }

    // Slot limit 2: third insert fails regardless of space.
    {
        let mut grid = StorageGrid::new(
            StorageConfig::with_region(vec![CellRect::new(0, 0, 4, 4)])
                .with_policy(CapacityPolicy::SlotLimited(2)),
        );
        let two_fit = grid.try_auto_place(ItemId(1), &unit).is_ok()
            && grid.try_auto_place(ItemId(2), &unit).is_ok();
        let third = grid.try_auto_place(ItemId(3), &unit);
        results.push(check(
            "scenario_slot_limit",
            two_fit && third == Err(RejectReason::TooManyItems) && grid.item_count() == 2,
            format!("{} items stored", grid.item_count()),
        ));
    }

    results
}

// ── 3. Rotation and irregular regions ───────────────────────────────────

fn validate_rotation_and_regions(_verbose: bool) -> Vec<TestResult> {
    println!("--- Rotation & Regions ---");
    let mut results = Vec::new();

    // A 2x1 plank in a 1x2 slot only fits turned.
    {
        let mut grid =
            StorageGrid::new(StorageConfig::with_region(vec![CellRect::new(0, 0, 1, 2)]));
        let plank = ItemSpec::of_size(2, 1, ItemSize::Normal);
        let placed = grid.try_auto_place(ItemId(1), &plank);
        results.push(check(
            "rotation_fallback",
            matches!(placed, Ok(p) if p.rotation == Rotation::Deg90),
            format!("{:?}", placed),
        ));
    }

    // L-shaped region: the hole in the bounding box stays unusable.
    {
        let grid = StorageGrid::new(StorageConfig::with_region(vec![
            CellRect::new(0, 0, 3, 1),
            CellRect::new(0, 1, 1, 2),
        ]));
        let hole_free = grid.is_cell_free(Cell::new(1, 1));
        let arm_free = grid.is_cell_free(Cell::new(0, 1));
        results.push(check(
            "l_region_mask",
            !hole_free && arm_free && grid.region().cell_count() == 5,
            format!("{} usable cells", grid.region().cell_count()),
        ));
    }

    results
}

// ── 4. Auto-placement determinism ───────────────────────────────────────

fn validate_determinism(_verbose: bool) -> Vec<TestResult> {
    println!("--- Determinism ---");

    let run = || {
        let mut grid = StorageGrid::new(StorageConfig::with_region(vec![
            CellRect::new(0, 0, 6, 3),
            CellRect::new(2, 3, 2, 2),
        ]));
        for i in 0..12u64 {
            let spec = match i % 3 {
                0 => ItemSpec::of_size(2, 1, ItemSize::Normal),
                1 => ItemSpec::of_size(1, 2, ItemSize::Normal),
                _ => ItemSpec::of_size(1, 1, ItemSize::Small),
            };
            let _ = grid.try_auto_place(ItemId(i), &spec);
        }
        grid.placements().collect::<Vec<_>>()
    };

    let first = run();
    let second = run();
    vec![check(
        "auto_place_deterministic",
        first == second && !first.is_empty(),
        format!("{} placements, identical across runs", first.len()),
    )]
}

// ── 5. Randomized churn ─────────────────────────────────────────────────

fn validate_churn(verbose: bool) -> Vec<TestResult> {
    println!("--- Randomized Churn ---");
    let mut results = Vec::new();
    let mut rng = StdRng::seed_from_u64(0x570A6E);

    let mut grid = StorageGrid::new(
        StorageConfig::with_region(vec![CellRect::new(0, 0, 8, 8)])
            .with_policy(CapacityPolicy::WeightLimited(60)),
    );

    let mut live: Vec<ItemId> = Vec::new();
    let mut next_id = 0u64;
    let mut inserts = 0u32;
    let mut removals = 0u32;
    let mut violations = Vec::new();

    for step in 0..500 {
        if live.is_empty() || rng.gen_range(0..3) > 0 {
            let spec = ItemSpec::new(
                rng.gen_range(1..=2),
                rng.gen_range(1..=2),
                rng.gen_range(1..=5),
                ItemSize::Small,
            );
            let id = ItemId(next_id);
            next_id += 1;
            if grid.try_auto_place(id, &spec).is_ok() {
                live.push(id);
                inserts += 1;
            }
        } else {
            let idx = rng.gen_range(0..live.len());
            let id = live.swap_remove(idx);
            if grid.remove(id).is_none() {
                violations.push(format!("step {}: remove lost {}", step, id));
            }
            removals += 1;
        }

        if let Err(v) = check_grid_invariants(&grid, 60) {
            violations.push(format!("step {}: {}", step, v));
            break;
        }
    }

    if verbose {
        println!(
            "  {} inserts, {} removals, {} live at end",
            inserts,
            removals,
            grid.item_count()
        );
    }

    results.push(check(
        "churn_invariants",
        violations.is_empty(),
        if violations.is_empty() {
            format!("{} inserts / {} removals clean", inserts, removals)
        } else {
            violations.join("; ")
        },
    ));
    results.push(check(
        "churn_made_progress",
        inserts > 50 && removals > 20,
        format!("{} inserts, {} removals", inserts, removals),
    ));

    results
}

/// Full occupancy/capacity invariant sweep over a grid.
fn check_grid_invariants(grid: &StorageGrid, weight_limit: u64) -> Result<(), String> {
    if grid.cumulative_weight() > weight_limit {
        return Err(format!(
            "weight {} exceeds limit {}",
            grid.cumulative_weight(),
            weight_limit
        ));
    }
    let placements: Vec<_> = grid.placements().collect();
    for (i, (id, a)) in placements.iter().enumerate() {
        if !grid.region().contains_rect(&a.rect) {
            return Err(format!("{} escaped the region", id));
        }
        for (other, b) in placements.iter().skip(i + 1) {
            if a.rect.intersects(&b.rect) {
                return Err(format!("{} overlaps {}", id, other));
            }
        }
    }
    Ok(())
}

// ── 6. World integration ────────────────────────────────────────────────

fn validate_world_integration(verbose: bool) -> Vec<TestResult> {
    println!("--- World Integration ---");
    let mut results = Vec::new();

    let mut sim = StorageSim::new();
    let locker = sim.spawn_storage_with(
        Storage::new(StorageConfig::with_region(vec![CellRect::new(0, 0, 3, 3)]))
            .with_area_insert(2.0),
        Position::new(0.0, 0.0),
    );

    // Scatter items: two in range, one out of range.
    for (x, y) in [(1.0, 0.0), (0.0, 1.0), (9.0, 9.0)] {
        sim.spawn_item(ItemSpec::of_size(1, 1, ItemSize::Small), Position::new(x, y));
    }

    let swept = sim.area_insert(locker);
    results.push(check(
        "area_insert_sweeps_in_range",
        swept == 2 && sim.stored_count(locker) == 2,
        format!("{} items swept", swept),
    ));

    let events = sim.drain_events();
    let inserted_events = events
        .iter()
        .filter(|e| matches!(e, StorageEvent::Inserted { .. }))
        .count();
    results.push(check(
        "events_recorded",
        inserted_events == 2,
        format!("{} insert events", inserted_events),
    ));

    sim.set_open(locker, true);
    let opened = sim
        .drain_events()
        .iter()
        .any(|e| matches!(e, StorageEvent::Opened { .. }));
    results.push(check("ui_open_event", opened, "open flag replicated"));

    // Save, reload, and make sure the grid and links survive.
    let mut buffer = Vec::new();
    let saved = sim.save(&mut buffer).is_ok();
    let mut loaded = StorageSim::new();
    let load_ok = saved && loaded.load(&buffer[..]).is_ok();

    let stored_after = loaded
        .world
        .query::<&Storage>()
        .iter()
        .map(|(_, s)| s.grid.item_count())
        .sum::<usize>();
    let linked_after = loaded.world.query::<&StoredIn>().iter().count();

    results.push(check(
        "save_load_round_trip",
        load_ok && stored_after == 2 && linked_after == 2,
        format!(
            "{} stored, {} linked after reload",
            stored_after, linked_after
        ),
    ));

    if verbose {
        println!("  save size: {} bytes", buffer.len());
    }

    results
}
