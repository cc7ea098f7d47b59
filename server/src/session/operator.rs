//! Operator key actions.
//!
//! Every action here requires operator privilege. Some also require the player
//! to have cells. A failed gate is a silent no-op, reported as a [`Rejection`].

use super::{Command, Rejection};
use crate::player::Player;
use crate::world::{GameServer, Node, NodeKind, EXPERIMENTAL_MODE};
use log::{debug, info};
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{Color, Vec2};
use std::f64::consts::TAU;

/// Colors offered by the food brush.
pub const FOOD_BRUSH_PALETTE: [Color; 12] = [
    Color::new(255, 0, 0),
    Color::new(255, 155, 0),
    Color::new(255, 255, 0),
    Color::new(0, 255, 0),
    Color::new(0, 0, 255),
    Color::new(140, 0, 185),
    Color::new(255, 0, 255),
    Color::new(140, 70, 15),
    Color::new(100, 100, 100),
    Color::new(170, 170, 170),
    Color::new(255, 255, 255),
    Color::new(0, 0, 0),
];

const VIRUS_COLOR: Color = Color::new(51, 255, 51);
const FOOD_BRUSH_STEP: f64 = 10.0;
/// Cells at or below this size are left alone by the shrink key.
const SHRINK_FLOOR: f64 = 20.0;

/// Size at which shedding stops.
fn shed_floor() -> f64 {
    1010f64.sqrt()
}

/// `min` when the range is empty, else uniform in `[min, max)`.
fn sample_size(rng: &mut impl Rng, min: f64, max: f64) -> f64 {
    if max > min {
        rng.gen_range(min..max)
    } else {
        min
    }
}

fn require_cells(player: &Player) -> Result<(), Rejection> {
    if player.is_alive() {
        Ok(())
    } else {
        Err(Rejection::NoCells)
    }
}

pub(super) fn run<W: GameServer>(
    command: Command,
    player: &mut Player,
    world: &mut W,
    rng: &mut impl Rng,
) -> Result<(), Rejection> {
    if !player.operator.enabled {
        return Err(Rejection::NotOperator);
    }

    match command {
        Command::Freeze => {
            require_cells(player)?;
            player.frozen = !player.frozen;
        }
        Command::MergeOverride => {
            player.merge_override = player.is_alive() && !player.merge_override;
        }
        Command::RecordMode => {
            require_cells(player)?;
            player.rec_mode = !player.rec_mode;
        }
        Command::KillCells => {
            require_cells(player)?;
            for id in player.cells.drain(..) {
                world.remove_node(id);
            }
        }
        Command::GrowCells => {
            require_cells(player)?;
            resize_cells(player, world, |size, step| Some(size + step));
        }
        Command::ShrinkCells => {
            require_cells(player)?;
            resize_cells(player, world, |size, step| {
                (size > SHRINK_FLOOR).then(|| size - step)
            });
        }
        Command::ClearWorld => clear_world(world),
        Command::ShedMass => {
            require_cells(player)?;
            shed_mass(player, world, rng);
        }
        Command::Recolor => {
            require_cells(player)?;
            let color = world.random_color();
            player.color = color;
            for &id in &player.cells {
                if let Some(cell) = world.node_mut(id) {
                    cell.color = color;
                }
            }
        }
        Command::SpawnVirus => {
            let size = world.config().virus_min_size;
            world.add_node(Node::new(NodeKind::Virus, player.mouse, size).with_color(VIRUS_COLOR));
        }
        Command::FoodBrushSize => {
            let limit = world.config().food_brush_limit;
            player.operator.food_size += FOOD_BRUSH_STEP;
            if player.operator.food_size >= limit + 1.0 {
                player.operator.food_size = FOOD_BRUSH_STEP;
            }
        }
        Command::Teleport => {
            require_cells(player)?;
            for &id in &player.cells {
                if let Some(cell) = world.node_mut(id) {
                    cell.position = player.mouse;
                    world.update_node_quad(id);
                }
            }
        }
        Command::SpawnFood => {
            let food = Node::new(NodeKind::Food, player.mouse, player.operator.food_size)
                .with_color(player.operator.food_color);
            world.add_node(food);
        }
        Command::FoodBrushColor => {
            if let Some(color) = FOOD_BRUSH_PALETTE.choose(rng) {
                player.operator.food_color = *color;
            }
        }
        Command::EjectAtCursor => eject_at_cursor(player, world, rng),
        Command::ScatterFood => scatter_food(player, world, rng),
        // Not an operator action
        _ => {}
    }
    Ok(())
}

fn resize_cells<W: GameServer>(
    player: &Player,
    world: &mut W,
    resize: impl Fn(f64, f64) -> Option<f64>,
) {
    let step = world.config().player_size_increment;
    for &id in &player.cells {
        if let Some(cell) = world.node_mut(id) {
            if let Some(size) = resize(cell.size, step) {
                cell.set_size(size);
            }
        }
    }
}

fn clear_world<W: GameServer>(world: &mut W) {
    let mut kinds = vec![NodeKind::Food, NodeKind::Virus, NodeKind::Ejected];
    if world.game_mode_id() == EXPERIMENTAL_MODE {
        kinds.push(NodeKind::MotherCell);
    }

    let mut removed = 0;
    for kind in kinds {
        for id in world.nodes_of(kind) {
            if world.remove_node(id).is_some() {
                removed += 1;
            }
        }
    }
    info!("Operator cleared {} nodes", removed);
}

/// Sheds ejected mass from each cell until it is down to the floor size.
fn shed_mass<W: GameServer>(player: &Player, world: &mut W, rng: &mut impl Rng) {
    let config = world.config();
    let (min, max) = (config.eject_min_size, config.eject_max_size);
    let speed = config.eject_speed;
    let random_color = config.eject_random_color;
    let floor = shed_floor();

    let mut shed = 0;
    for &id in &player.cells {
        loop {
            let Some(cell) = world.node_mut(id) else {
                break;
            };
            if cell.size <= floor {
                break;
            }

            let angle = 6.28 * rng.gen::<f64>();
            let loss = sample_size(rng, min, max);
            let cost = (loss + 5.0) * (loss + 5.0);
            if cost <= 0.0 {
                break;
            }
            cell.set_size((cell.radius - cost).max(0.0).sqrt());
            let position = Vec2::new(cell.position.x + angle, cell.position.y + angle);

            let color = if random_color {
                world.random_color()
            } else {
                player.color
            };
            let mut eject = Node::new(NodeKind::Ejected, position, loss).with_color(color);
            eject.set_boost(speed * rng.gen::<f64>(), angle);
            world.add_node(eject);
            shed += 1;
        }
        if let Some(cell) = world.node_mut(id) {
            cell.set_size(floor);
        }
    }
    debug!("Player {} shed {} masses", player.id, shed);
}

/// Ejects one mass at the cursor. The direction comes from the first cell only.
fn eject_at_cursor<W: GameServer>(player: &Player, world: &mut W, rng: &mut impl Rng) {
    let no_aim = player.is_spectating || player.cells.is_empty();
    let first_cell = player
        .cells
        .first()
        .and_then(|id| world.node(*id))
        .map(|cell| cell.position);

    let angle = match first_cell {
        Some(origin) if !no_aim => (player.mouse.x - origin.x).atan2(player.mouse.y - origin.y),
        _ => rng.gen_range(0.0..TAU),
    };

    let config = world.config();
    let size = sample_size(rng, config.eject_min_size, config.eject_max_size);
    let speed = config.eject_speed;
    let color = if no_aim || config.eject_random_color {
        world.random_color()
    } else {
        player.color
    };
    let distance = if no_aim { rng.gen::<f64>() } else { 1.0 } * speed;

    let mut eject = Node::new(NodeKind::Ejected, player.mouse, size).with_color(color);
    eject.set_boost(distance, angle);
    world.add_node(eject);
}

/// Throws one food pellet outward from the edge of each cell.
fn scatter_food<W: GameServer>(player: &Player, world: &mut W, rng: &mut impl Rng) {
    let config = world.config();
    let (min, max) = (config.food_min_size, config.food_max_size);

    for &id in &player.cells {
        let Some(cell) = world.node(id) else {
            continue;
        };
        let (center, radius) = (cell.position, cell.size);

        let angle = rng.gen_range(0.0..TAU);
        let position = Vec2::new(
            center.x + radius * angle.sin(),
            center.y + radius * angle.cos(),
        );
        let size = sample_size(rng, min, max);
        let color = world.random_color();

        let mut food = Node::new(NodeKind::Food, position, size).with_color(color);
        food.set_boost(200.0 + 200.0 * rng.gen::<f64>(), angle);
        world.add_node(food);
    }
}
