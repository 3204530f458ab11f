//! Thinning and path tracing on binary masks.

use image::GrayImage;
use std::collections::{HashMap, VecDeque};

const NEIGHBOURS: [(i32, i32); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

/// Zhang-Suen thinning. Non-zero pixels are foreground; the result is 0/255.
pub(super) fn thin(mask: &GrayImage) -> GrayImage {
    let (w, h) = mask.dimensions();
    let (w, h) = (w as usize, h as usize);
    // One pixel of zero padding on every side keeps the neighbourhood lookups in bounds.
    let pw = w + 2;
    let mut grid = vec![0u8; pw * (h + 2)];
    for (x, y, p) in mask.enumerate_pixels() {
        if p[0] > 0 {
            grid[(y as usize + 1) * pw + x as usize + 1] = 1;
        }
    }

    let mut to_clear = Vec::new();
    loop {
        let mut changed = false;
        for pass in 0..2 {
            to_clear.clear();
            for y in 1..=h {
                for x in 1..=w {
                    let idx = y * pw + x;
                    if grid[idx] == 0 {
                        continue;
                    }
                    // P2..P9 clockwise from north.
                    let p = [
                        grid[idx - pw],
                        grid[idx - pw + 1],
                        grid[idx + 1],
                        grid[idx + pw + 1],
                        grid[idx + pw],
                        grid[idx + pw - 1],
                        grid[idx - 1],
                        grid[idx - pw - 1],
                    ];
                    let neighbours: u8 = p.iter().sum();
                    if !(2..=6).contains(&neighbours) {
                        continue;
                    }
                    let transitions = (0..8).filter(|&i| p[i] == 0 && p[(i + 1) % 8] == 1).count();
                    if transitions != 1 {
                        continue;
                    }
                    let (a, b) = if pass == 0 {
                        (p[0] * p[2] * p[4], p[2] * p[4] * p[6])
                    } else {
                        (p[0] * p[2] * p[6], p[0] * p[4] * p[6])
                    };
                    if a == 0 && b == 0 {
                        to_clear.push(idx);
                    }
                }
            }
            if !to_clear.is_empty() {
                changed = true;
                for &idx in &to_clear {
                    grid[idx] = 0;
                }
            }
        }
        if !changed {
            break;
        }
    }

    GrayImage::from_fn(w as u32, h as u32, |x, y| {
        let v = grid[(y as usize + 1) * pw + x as usize + 1];
        image::Luma([v * 255])
    })
}

/// Longest shortest path through an 8-connected pixel set, found by two
/// breadth-first searches. Pixels are `(x, y)`.
pub(super) fn longest_path(pixels: &[(u32, u32)]) -> Vec<(u32, u32)> {
    if pixels.len() <= 1 {
        return pixels.to_vec();
    }
    let mut sorted = pixels.to_vec();
    sorted.sort_unstable_by_key(|&(x, y)| (y, x));
    let index: HashMap<(u32, u32), usize> =
        sorted.iter().enumerate().map(|(i, &p)| (p, i)).collect();
    let index = &index;

    let neighbours = |i: usize| {
        let (x, y) = sorted[i];
        NEIGHBOURS.iter().filter_map(move |&(dx, dy)| {
            let nx = x as i64 + dx as i64;
            let ny = y as i64 + dy as i64;
            if nx < 0 || ny < 0 {
                return None;
            }
            index.get(&(nx as u32, ny as u32)).copied()
        })
    };

    let bfs = |start: usize| {
        let mut dist = vec![usize::MAX; sorted.len()];
        let mut parent = vec![usize::MAX; sorted.len()];
        let mut queue = VecDeque::from([start]);
        dist[start] = 0;
        let mut farthest = start;
        while let Some(cur) = queue.pop_front() {
            if dist[cur] > dist[farthest] {
                farthest = cur;
            }
            for next in neighbours(cur) {
                if dist[next] == usize::MAX {
                    dist[next] = dist[cur] + 1;
                    parent[next] = cur;
                    queue.push_back(next);
                }
            }
        }
        (farthest, parent)
    };

    let (a, _) = bfs(0);
    let (b, parent) = bfs(a);
    let mut path = vec![sorted[b]];
    let mut cur = b;
    while cur != a {
        cur = parent[cur];
        path.push(sorted[cur]);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thin_thick_bar_to_single_line() {
        let mut mask = GrayImage::new(30, 9);
        for y in 2..7 {
            for x in 2..28 {
                mask.put_pixel(x, y, image::Luma([255]));
            }
        }
        let skeleton = thin(&mask);
        for x in 6..24 {
            let column: u32 = (0..9).map(|y| (skeleton.get_pixel(x, y)[0] > 0) as u32).sum();
            assert_eq!(column, 1, "column {x} should hold one skeleton pixel");
        }
    }

    #[test]
    fn test_longest_path_follows_line_and_ignores_spur() {
        let mut pixels: Vec<(u32, u32)> = (0..20).map(|x| (x, 5)).collect();
        pixels.extend([(10, 4), (10, 3)]);
        let path = longest_path(&pixels);
        assert_eq!(path.len(), 20);
        let ends = [path[0], path[path.len() - 1]];
        assert!(ends.contains(&(0, 5)) && ends.contains(&(19, 5)));
    }
}
